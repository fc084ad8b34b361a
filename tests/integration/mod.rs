/// End-to-end tests driving the server over an in-memory byte stream
mod server_flow;
