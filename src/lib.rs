/// Public library interface for the MCP tool server
///
/// This module exports the server implementation and the public types
/// that can be used by other applications or tests.

use std::sync::Arc;
use thiserror::Error;

pub mod config;
pub mod mcp;
pub mod tools;

// Re-export public modules and types
pub use config::{ConfigError, ServerConfig};
pub use mcp::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, ToolDescriptor};
pub use mcp::{FramingError, McpServer};
pub use tools::{QuoteTool, RegistryError, Tool, ToolError, ToolRegistry, WeatherConfig, WeatherTool};

/// Errors that can occur during server operation
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Registry with the tools this server ships with
///
/// getWeather is registered first, then getRandomQuote.
pub fn default_registry(weather: WeatherConfig) -> Result<ToolRegistry, ServerError> {
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool::new(weather)?)?;
    registry.register(QuoteTool::new())?;
    Ok(registry)
}

/// Main tool server
///
/// Owns the configuration and the frozen tool registry. Each call to
/// [`ToolServer::run`] or [`ToolServer::serve`] drives one connection with a
/// fresh session.
pub struct ToolServer {
    server: McpServer,
    registry: Arc<ToolRegistry>,
}

impl ToolServer {
    /// Create a server with the default tools
    pub fn new(config: ServerConfig, weather: WeatherConfig) -> Result<Self, ServerError> {
        let registry = default_registry(weather)?;
        Self::with_registry(config, registry)
    }

    /// Create a server around an already populated registry
    pub fn with_registry(config: ServerConfig, registry: ToolRegistry) -> Result<Self, ServerError> {
        config.validate()?;
        tracing::info!(
            "Initializing {} v{} with {} tools",
            config.name,
            config.version,
            registry.len()
        );

        let registry = Arc::new(registry);
        Ok(Self {
            server: McpServer::new(Arc::clone(&registry), config),
            registry,
        })
    }

    /// Run the MCP server, handling JSON-RPC requests over stdin/stdout
    ///
    /// Returns once stdin closes.
    pub async fn run(&self) -> Result<(), ServerError> {
        for tool in self.registry.list() {
            tracing::debug!("Serving tool '{}'", tool.name);
        }
        self.server.run().await
    }

    /// Serve one connection over an arbitrary byte stream
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        self.server.serve(reader, writer).await
    }

    /// Get a reference to the tool registry (useful for testing)
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}
