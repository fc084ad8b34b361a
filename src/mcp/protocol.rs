/// MCP (Model Context Protocol) message structures and JSON-RPC handling
///
/// This module defines the JSON-RPC 2.0 envelope the server reads and writes,
/// the standard error codes, and the payloads of the `initialize`,
/// `tools/list` and `tools/call` methods.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON-RPC version carried by every message
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol versions accepted in `initialize`, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05", "2.0"];

/// Request identifier
///
/// Opaque to the server: it is only ever echoed back in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
}

impl RequestId {
    /// Read an id from a raw JSON value, if it has an acceptable type
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value.into())
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

/// JSON-RPC 2.0 request or notification
///
/// A message without `id` is a notification and never gets a response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    pub id: Option<RequestId>,
    pub method: String,
    /// Parameters for the method call (empty when omitted)
    pub params: Map<String, Value>,
}

/// A message that is JSON but not a valid request
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid Request: {reason}")]
pub struct InvalidRequest {
    /// The id, when it could still be read from the message
    pub id: Option<RequestId>,
    pub reason: String,
}

impl JsonRpcRequest {
    /// Validate the envelope of a decoded message
    pub fn from_value(value: Value) -> Result<Self, InvalidRequest> {
        let mut object = match value {
            Value::Object(object) => object,
            _ => {
                return Err(InvalidRequest {
                    id: None,
                    reason: "request must be a JSON object".to_string(),
                })
            }
        };

        let id = match object.get("id") {
            None => None,
            Some(raw) => match RequestId::from_value(raw) {
                Some(id) => Some(id),
                None => {
                    return Err(InvalidRequest {
                        id: None,
                        reason: "'id' must be a string or a number".to_string(),
                    })
                }
            },
        };
        let invalid = |reason: &str| InvalidRequest {
            id: id.clone(),
            reason: reason.to_string(),
        };

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid("'jsonrpc' must be \"2.0\""));
        }

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => return Err(invalid("'method' must be a string")),
            None => return Err(invalid("'method' is required")),
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => return Err(invalid("'params' must be an object")),
        };

        Ok(Self { id, method, params })
    }

    /// Whether this message expects no response
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response message
///
/// The payload is either a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

/// Body of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Result(Value),
    Error(JsonRpcError),
}

/// JSON-RPC error information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard JSON-RPC codes)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Additional error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

// JSON-RPC error codes (standard codes)
pub mod error_codes {
    /// Parse error - Invalid JSON was received by the server
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The requested method (or tool) doesn't exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid parameters - Method exists but parameters are wrong
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - A tool handler crashed
    pub const INTERNAL_ERROR: i32 = -32603;

    // Server-defined codes, -32000 to -32099
    /// A tool reported a failure without choosing its own code
    pub const TOOL_EXECUTION_ERROR: i32 = -32000;
    /// A tool call ran past the configured timeout
    pub const REQUEST_TIMEOUT: i32 = -32001;
    /// A method other than `initialize` arrived before `initialize`
    pub const SERVER_NOT_INITIALIZED: i32 = -32002;
}

/// Failures of the JSON-RPC layer itself
///
/// All of these are reported to the client; none of them close the connection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {message}")]
    InvalidParams { message: String, data: Option<Value> },

    #[error("Server not initialized")]
    NotInitialized,
}

impl ProtocolError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        ProtocolError::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    /// Wire code for this error
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            ProtocolError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            ProtocolError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            ProtocolError::NotInitialized => error_codes::SERVER_NOT_INITIALIZED,
        }
    }
}

impl From<ProtocolError> for JsonRpcError {
    fn from(error: ProtocolError) -> Self {
        let code = error.code();
        let message = error.to_string();
        match error {
            ProtocolError::InvalidParams { data: Some(data), .. } => {
                JsonRpcError::new(code, message).with_data(data)
            }
            _ => JsonRpcError::new(code, message),
        }
    }
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    /// Create an error response
    pub fn error(id: RequestId, error: impl Into<JsonRpcError>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Error(error.into()),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            ResponsePayload::Error(error) => Some(error),
            ResponsePayload::Result(_) => None,
        }
    }
}

/// MCP tool definition
///
/// This describes a tool the server offers. Registered once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name, unique within the registry
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for the tool's input arguments
    pub input_schema: Value,
}

/// MCP tool call result with text content
///
/// Tools that answer in prose wrap their text in this shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Tool execution results
    pub content: Vec<ToolContent>,
    /// Whether this is an error result
    pub is_error: bool,
}

/// Content returned by a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolContent {
    /// Type of content (usually "text")
    #[serde(rename = "type")]
    pub content_type: String,
    /// The actual content/result
    pub text: String,
}

impl ToolCallResult {
    /// Create a successful tool result with text content
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                content_type: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// MCP initialization request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version the client wants to speak
    pub protocol_version: Option<String>,
    /// Client information
    pub client_info: Option<ClientInfo>,
}

/// Information about the MCP client
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// MCP initialization response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Negotiated protocol version
    pub protocol_version: String,
    /// Our server capabilities
    pub capabilities: ServerCapabilities,
    /// Information about this server
    pub server_info: ServerInfo,
}

/// MCP server capabilities
#[derive(Debug, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

/// Tools capability information
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// The tool list never changes after startup
    pub list_changed: bool,
}

/// Name and version reported in `initialize`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}
