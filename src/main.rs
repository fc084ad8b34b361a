/// Main entry point for the MCP tool server
///
/// This file sets up logging, parses command line arguments, and starts the MCP server.
/// The server reads Content-Length framed JSON-RPC requests from stdin and writes
/// responses to stdout; logs go to stderr.

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcp_tool_server::{ServerConfig, ToolServer, WeatherConfig};

/// Command line arguments for the MCP tool server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server name reported to clients
    #[arg(long, env = "MCP_SERVER_NAME", default_value = env!("CARGO_PKG_NAME"))]
    name: String,

    /// Maximum time a tool call may run, in seconds
    #[arg(long, env = "MCP_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout: u64,

    /// Largest accepted message payload, in bytes
    #[arg(long, env = "MCP_MAX_FRAME_BYTES", default_value_t = mcp_tool_server::mcp::codec::DEFAULT_MAX_FRAME_SIZE)]
    max_frame_bytes: usize,

    /// Tool calls allowed to run at the same time
    #[arg(long, env = "MCP_MAX_IN_FLIGHT", default_value_t = 16)]
    max_in_flight: usize,

    /// OpenWeather API key used by getWeather
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    openweather_api_key: Option<String>,

    /// OpenWeather API base URL
    #[arg(long, env = "OPENWEATHER_BASE_URL", default_value = mcp_tool_server::tools::weather::DEFAULT_BASE_URL)]
    openweather_base_url: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mcp_tool_server={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // Send logs to stderr, stdout carries the protocol
        .init();

    info!("Starting MCP tool server");

    let config = ServerConfig {
        name: args.name,
        request_timeout: Duration::from_secs(args.request_timeout),
        max_frame_size: args.max_frame_bytes,
        max_in_flight: args.max_in_flight,
        ..ServerConfig::default()
    };
    let weather = WeatherConfig {
        api_key: args.openweather_api_key.filter(|key| !key.is_empty()),
        base_url: args.openweather_base_url,
        ..WeatherConfig::default()
    };
    if weather.api_key.is_none() {
        tracing::warn!("OPENWEATHER_API_KEY is not set; getWeather calls will fail");
    }

    let server = ToolServer::new(config, weather)?;

    // Serve stdin/stdout until the client closes its end
    server.run().await?;

    info!("MCP tool server shutdown complete");
    Ok(())
}
