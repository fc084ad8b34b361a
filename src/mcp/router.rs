/// JSON-RPC method dispatch
///
/// The router turns one decoded frame into at most one response. Everything
/// except tool execution is answered synchronously; a `tools/call` that
/// passes validation comes back as a [`PendingCall`] so the connection can
/// run it off the read loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::mcp::codec::Frame;
use crate::mcp::protocol::*;
use crate::mcp::session::Session;
use crate::tools::{Tool, ToolRegistry};

/// Methods this server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Initialize,
    Ping,
    ToolsList,
    ToolsCall,
    /// Client confirmation that the handshake is complete
    Initialized,
    /// Client gave up on an earlier request
    Cancelled,
    Unknown,
}

impl Method {
    pub fn from_name(name: &str) -> Self {
        match name {
            "initialize" => Method::Initialize,
            "ping" => Method::Ping,
            "tools/list" => Method::ToolsList,
            "tools/call" => Method::ToolsCall,
            "notifications/initialized" | "initialized" => Method::Initialized,
            "notifications/cancelled" => Method::Cancelled,
            _ => Method::Unknown,
        }
    }

    /// Whether the method may be used before `initialize`
    fn allowed_before_initialize(self) -> bool {
        matches!(self, Method::Initialize | Method::Ping)
    }
}

/// What the connection should do with a frame
pub enum Dispatch {
    /// Nothing to send (notification, or a message without a usable id)
    Ignore,
    /// Answer immediately
    Respond(JsonRpcResponse),
    /// Run a tool, then answer
    Call(PendingCall),
}

/// A validated tool call waiting to run
pub struct PendingCall {
    pub id: RequestId,
    pub tool_name: String,
    tool: Arc<dyn Tool>,
    arguments: Map<String, Value>,
}

/// Aborts the tool task once nobody waits for its result
///
/// Dropping a [`PendingCall::run`] future, e.g. when the connection fails
/// mid-flight, stops the tool instead of leaving it running detached.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl PendingCall {
    /// Run the tool on its own task, bounded by `timeout`
    ///
    /// Panics and timeouts inside the tool become error responses; they
    /// never reach the caller.
    pub async fn run(self, timeout: Duration) -> JsonRpcResponse {
        let PendingCall {
            id,
            tool_name,
            tool,
            arguments,
        } = self;

        debug!("Calling tool '{}' for request {}", tool_name, id);
        let mut task = AbortOnDrop(tokio::spawn(async move { tool.invoke(arguments).await }));

        match tokio::time::timeout(timeout, &mut task.0).await {
            Ok(Ok(Ok(result))) => JsonRpcResponse::success(id, result),
            Ok(Ok(Err(tool_error))) => {
                warn!("Tool '{}' failed: {}", tool_name, tool_error);
                JsonRpcResponse::error(id, tool_error)
            }
            Ok(Err(join_error)) => {
                error!("Tool '{}' crashed: {}", tool_name, join_error);
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(
                        error_codes::INTERNAL_ERROR,
                        format!("Internal error: tool '{}' failed unexpectedly", tool_name),
                    ),
                )
            }
            Err(_) => {
                // The guard aborts the task on return
                warn!("Tool '{}' timed out after {:?}", tool_name, timeout);
                JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(
                        error_codes::REQUEST_TIMEOUT,
                        format!("Request timed out after {} ms", timeout.as_millis()),
                    ),
                )
            }
        }
    }
}

/// Dispatches requests for one server; shared by all its connections
pub struct Router {
    registry: Arc<ToolRegistry>,
    server_info: ServerInfo,
}

impl Router {
    pub fn new(registry: Arc<ToolRegistry>, server_info: ServerInfo) -> Self {
        Self {
            registry,
            server_info,
        }
    }

    /// Decide what to do with one frame
    pub fn route(&self, session: &mut Session, frame: Frame) -> Dispatch {
        let value = match frame {
            Frame::Message(value) => value,
            Frame::Malformed(e) => {
                // No id can be recovered from a payload that is not JSON
                warn!("Dropping unparseable message: {}", e);
                return Dispatch::Ignore;
            }
        };

        let request = match JsonRpcRequest::from_value(value) {
            Ok(request) => request,
            Err(invalid) => {
                return match invalid.id {
                    Some(id) => {
                        warn!("Invalid request {}: {}", id, invalid.reason);
                        Dispatch::Respond(JsonRpcResponse::error(
                            id,
                            ProtocolError::InvalidRequest(invalid.reason),
                        ))
                    }
                    None => {
                        warn!("Dropping invalid request without id: {}", invalid.reason);
                        Dispatch::Ignore
                    }
                };
            }
        };

        self.dispatch(session, request)
    }

    /// Dispatch an already validated request
    pub fn dispatch(&self, session: &mut Session, request: JsonRpcRequest) -> Dispatch {
        let method = Method::from_name(&request.method);
        let id = match request.id {
            Some(id) => id,
            None => {
                self.handle_notification(method, &request.method, &request.params);
                return Dispatch::Ignore;
            }
        };

        if !method.allowed_before_initialize() {
            if let Err(e) = session.require_ready() {
                debug!("Rejecting '{}' before initialize", request.method);
                return Dispatch::Respond(JsonRpcResponse::error(id, e));
            }
        }

        let outcome = match method {
            Method::Initialize => self.handle_initialize(session, request.params),
            Method::Ping => Ok(json!({})),
            Method::ToolsList => Ok(self.handle_tools_list()),
            Method::ToolsCall => {
                return match self.prepare_tool_call(id.clone(), request.params) {
                    Ok(call) => Dispatch::Call(call),
                    Err(e) => Dispatch::Respond(JsonRpcResponse::error(id, e)),
                };
            }
            Method::Initialized | Method::Cancelled | Method::Unknown => {
                Err(ProtocolError::MethodNotFound(request.method).into())
            }
        };

        Dispatch::Respond(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, e),
        })
    }

    fn handle_notification(&self, method: Method, name: &str, params: &Map<String, Value>) {
        match method {
            Method::Initialized => info!("Client finished initialization"),
            Method::Cancelled => {
                let request = params.get("requestId").map(|id| id.to_string()).unwrap_or_default();
                info!("Client cancelled request {}", request);
            }
            _ => debug!("Ignoring notification '{}'", name),
        }
    }

    /// Handle MCP initialization request
    fn handle_initialize(
        &self,
        session: &mut Session,
        params: Map<String, Value>,
    ) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = serde_json::from_value(Value::Object(params))
            .map_err(|e| ProtocolError::invalid_params(e.to_string()))?;

        let version = match params.protocol_version {
            Some(version) if SUPPORTED_PROTOCOL_VERSIONS.contains(&version.as_str()) => version,
            other => {
                let message = match other {
                    Some(version) => format!("unsupported protocol version '{}'", version),
                    None => "'protocolVersion' is required".to_string(),
                };
                return Err(ProtocolError::InvalidParams {
                    message,
                    data: Some(json!({ "supported": SUPPORTED_PROTOCOL_VERSIONS })),
                }
                .into());
            }
        };

        if session.is_ready() {
            debug!("Re-initialize on ready session, protocol {}", version);
        } else {
            info!(
                "MCP client connected: {} (protocol {})",
                params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
                version
            );
        }

        let result = InitializeResult {
            protocol_version: version.clone(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability { list_changed: false },
            },
            server_info: self.server_info.clone(),
        };
        let result = serde_json::to_value(result).map_err(|e| {
            JsonRpcError::new(error_codes::INTERNAL_ERROR, format!("Internal error: {}", e))
        })?;

        session.mark_ready(version, params.client_info);
        Ok(result)
    }

    /// Handle tools/list request
    fn handle_tools_list(&self) -> Value {
        json!({ "tools": self.registry.list() })
    }

    /// Validate a tools/call request and find its tool
    fn prepare_tool_call(
        &self,
        id: RequestId,
        mut params: Map<String, Value>,
    ) -> Result<PendingCall, JsonRpcError> {
        let tool_name = match params.remove("name") {
            Some(Value::String(name)) => name,
            _ => {
                return Err(ProtocolError::invalid_params("'name' is required and must be a string").into())
            }
        };

        let arguments = match params.remove("arguments") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err(ProtocolError::invalid_params("'arguments' must be an object").into()),
        };

        let tool = self.registry.lookup(&tool_name).ok_or_else(|| {
            debug!("Unknown tool '{}'", tool_name);
            JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Tool not found: {}", tool_name),
            )
        })?;

        if let Some(schema) = self.registry.arguments(&tool_name) {
            schema.validate(&arguments).map_err(|reason| {
                ProtocolError::invalid_params(format!("{} for tool '{}'", reason, tool_name))
            })?;
        }

        Ok(PendingCall {
            id,
            tool_name,
            tool,
            arguments,
        })
    }
}
