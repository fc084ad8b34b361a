/// MCP protocol implementation
/// 
/// This module handles the Model Context Protocol communication,
/// including message framing, JSON-RPC parsing, session gating and
/// tool routing.

pub mod codec;
pub mod protocol;
pub mod router;
pub mod server;
pub mod session;

// Re-export main types
pub use codec::{Frame, FrameReader, FrameWriter, FramingError, ParseError};
pub use router::{Dispatch, Method, PendingCall, Router};
pub use server::McpServer;
pub use session::{Session, SessionState};
