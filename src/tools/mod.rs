/// MCP tools
///
/// This module defines the uniform contract every tool implements, the
/// registry that maps tool names to implementations, and the tools this
/// server ships with.

pub mod registry;
pub mod schema;
pub mod quote;
pub mod weather;

// Re-export the main tool types
pub use registry::*;
pub use quote::QuoteTool;
pub use weather::{WeatherConfig, WeatherTool};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::mcp::protocol::{error_codes, JsonRpcError, ToolCallResult, ToolDescriptor};

/// A named, schema-described unit of functionality invocable via `tools/call`
///
/// The server only ever sees this interface. Implementations must be cheap to
/// share across tasks since every call runs on its own task.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and input schema; read once at registration
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with arguments already checked against its schema
    ///
    /// The returned value is forwarded unchanged as the JSON-RPC `result`.
    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError>;
}

/// Failure reported by a tool
///
/// Forwarded to the client as a JSON-RPC `error` object; the connection stays
/// open.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ToolError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

impl ToolError {
    /// Failure with the generic tool execution code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: error_codes::TOOL_EXECUTION_ERROR,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<ToolError> for JsonRpcError {
    fn from(error: ToolError) -> Self {
        JsonRpcError {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

/// Deserialize a tool's typed arguments from the raw mapping
pub fn parse_arguments<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| {
        ToolError::new(format!("Invalid arguments: {}", e)).with_code(error_codes::INVALID_PARAMS)
    })
}

/// Successful MCP text content result, ready to return from [`Tool::invoke`]
pub fn text_result(text: impl Into<String>) -> Result<Value, ToolError> {
    ToolCallResult::success(text).into_value().map_err(|e| {
        ToolError::new(format!("Internal error: {}", e)).with_code(error_codes::INTERNAL_ERROR)
    })
}

/// JSON schema of an argument struct, as sent in `tools/list`
pub fn input_schema<T: schemars::JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}
