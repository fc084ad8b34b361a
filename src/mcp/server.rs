/// MCP server implementation that handles one JSON-RPC connection
///
/// This module implements the connection loop that:
/// 1. Reads Content-Length framed requests from the input stream
/// 2. Dispatches them through the router, running tool calls concurrently
/// 3. Writes the responses back in the order the requests arrived

use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{FuturesOrdered, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::mcp::codec::{FrameReader, FrameWriter};
use crate::mcp::protocol::{JsonRpcResponse, ServerInfo};
use crate::mcp::router::{Dispatch, Router};
use crate::mcp::session::Session;
use crate::tools::ToolRegistry;
use crate::ServerError;

/// MCP server serving a fixed tool registry
pub struct McpServer {
    router: Router,
    config: ServerConfig,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(registry: Arc<ToolRegistry>, config: ServerConfig) -> Self {
        let server_info = ServerInfo {
            name: config.name.clone(),
            version: config.version.clone(),
        };
        Self {
            router: Router::new(registry, server_info),
            config,
        }
    }

    /// Run the MCP server over stdin/stdout
    pub async fn run(&self) -> Result<(), ServerError> {
        info!("Starting MCP server, waiting for JSON-RPC requests...");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one connection until its input closes
    ///
    /// Requests are read one frame at a time. Tool calls run on their own
    /// tasks while reading continues, but responses are queued so they go out
    /// in arrival order. Closing the input ends the session normally; a
    /// framing error ends it with an error once pending responses are written.
    /// If the output fails, the error is returned at once and the tool calls
    /// still in flight are aborted along with the queue.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::with_max_frame_size(reader, self.config.max_frame_size);
        let mut output = FrameWriter::new(writer);
        let mut session = Session::new();
        let mut in_flight: FuturesOrdered<BoxFuture<'static, JsonRpcResponse>> = FuturesOrdered::new();
        let mut reading = true;
        let mut failure = None;

        loop {
            if !reading && in_flight.is_empty() {
                break;
            }
            let can_read = reading && in_flight.len() < self.config.max_in_flight;

            tokio::select! {
                next = frames.next_frame(), if can_read => match next {
                    Ok(Some(frame)) => match self.router.route(&mut session, frame) {
                        Dispatch::Ignore => {}
                        Dispatch::Respond(response) => {
                            if in_flight.is_empty() {
                                output.send(&response).await?;
                            } else {
                                // Keep behind the calls that arrived first
                                in_flight.push_back(future::ready(response).boxed());
                            }
                        }
                        Dispatch::Call(call) => {
                            in_flight.push_back(call.run(self.config.request_timeout).boxed());
                        }
                    },
                    Ok(None) => {
                        info!("MCP server shutting down (input closed)");
                        reading = false;
                    }
                    Err(e) => {
                        error!("Closing connection after framing error: {}", e);
                        failure = Some(e);
                        reading = false;
                    }
                },
                Some(response) = in_flight.next(), if !in_flight.is_empty() => {
                    output.send(&response).await?;
                }
            }
        }

        if let Err(e) = output.shutdown().await {
            debug!("Failed to close output: {}", e);
        }
        debug!("Connection finished, session state {:?}", session.state());
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
