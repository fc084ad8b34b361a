/// Full-connection tests: frames in, frames out
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mcp_tool_server::mcp::codec::encode_frame;
use mcp_tool_server::mcp::{Frame, FrameReader};
use mcp_tool_server::*;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Stands in for the real weather backend
struct WeatherStub;

#[async_trait]
impl Tool for WeatherStub {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "getWeather".to_string(),
            description: "Current weather for a city".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        }
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        Ok(json!({"temp": 18}))
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "sleep".to_string(),
            description: "Sleeps for the given number of milliseconds".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"ms": {"type": "integer"}},
                "required": ["ms"]
            }),
        }
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let ms = arguments.get("ms").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(json!({"slept_ms": ms}))
    }
}

struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "explode".to_string(),
            description: "Always panics".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        panic!("handler bug");
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "fail".to_string(),
            description: "Always reports a failure".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        Err(ToolError::new("backend unavailable").with_code(-32050))
    }
}

/// Records whether it started and whether it ran to completion
struct TrackedTool {
    started: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl Tool for TrackedTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "tracked".to_string(),
            description: "Sleeps for half a second".to_string(),
            input_schema: json!({"type": "object"}),
        }
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value, ToolError> {
        self.started.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(json!({}))
    }
}

/// Output whose reader goes away right after the first response
#[derive(Default)]
struct ClosesAfterFirstFlush {
    flushed: bool,
}

impl AsyncWrite for ClosesAfterFirstFlush {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.flushed {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away")))
        } else {
            Poll::Ready(Ok(buf.len()))
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.flushed = true;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn test_server(request_timeout: Duration) -> Arc<ToolServer> {
    test_server_with(ServerConfig {
        request_timeout,
        ..ServerConfig::default()
    })
}

fn test_server_with(config: ServerConfig) -> Arc<ToolServer> {
    let mut registry = ToolRegistry::new();
    registry.register(WeatherStub).expect("register weather");
    registry.register(SlowTool).expect("register sleep");
    registry.register(PanickingTool).expect("register explode");
    registry.register(FailingTool).expect("register fail");

    let config = ServerConfig {
        name: "MyMCPServer".to_string(),
        version: "1.0.0".to_string(),
        ..config
    };
    Arc::new(ToolServer::with_registry(config, registry).expect("Failed to create server"))
}

fn frames(messages: &[Value]) -> Vec<u8> {
    messages
        .iter()
        .flat_map(|m| encode_frame(m).expect("encode frame"))
        .collect()
}

/// Feed raw bytes to a fresh connection, then collect every response
async fn exchange_raw(server: Arc<ToolServer>, input: Vec<u8>) -> (Vec<Value>, Result<(), ServerError>) {
    let (client, connection) = tokio::io::duplex(1 << 16);
    let (server_read, server_write) = tokio::io::split(connection);
    let handle = tokio::spawn(async move { server.serve(server_read, server_write).await });

    let (client_read, mut client_write) = tokio::io::split(client);
    client_write.write_all(&input).await.expect("write requests");
    client_write.shutdown().await.expect("close input");

    let mut reader = FrameReader::new(client_read);
    let mut responses = Vec::new();
    while let Some(frame) = reader.next_frame().await.expect("read response") {
        match frame {
            Frame::Message(value) => responses.push(value),
            Frame::Malformed(e) => panic!("server sent invalid JSON: {}", e),
        }
    }

    let outcome = handle.await.expect("server task panicked");
    (responses, outcome)
}

async fn exchange(server: Arc<ToolServer>, messages: &[Value]) -> Vec<Value> {
    let (responses, outcome) = exchange_raw(server, frames(messages)).await;
    outcome.expect("connection should end cleanly");
    responses
}

fn initialize(id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {"protocolVersion": "2.0", "clientInfo": {"name": "test", "version": "1.0"}}
    })
}

fn call(id: Value, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
}

fn ids(responses: &[Value]) -> Vec<Value> {
    responses.iter().map(|r| r["id"].clone()).collect()
}

#[cfg(test)]
mod server_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_smoke_test_sequence() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!("1")),
                json!({"jsonrpc": "2.0", "id": "2", "method": "tools/list", "params": {}}),
                call(json!("4"), "getWeather", json!({"city": "Seoul"})),
                call(json!("5"), "invalidTool", json!({})),
            ],
        )
        .await;

        assert_eq!(ids(&responses), vec![json!("1"), json!("2"), json!("4"), json!("5")]);

        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "MyMCPServer");
        assert_eq!(responses[0]["result"]["protocolVersion"], "2.0");

        let names: Vec<_> = responses[1]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["getWeather", "sleep", "explode", "fail"]);

        assert_eq!(responses[2]["result"], json!({"temp": 18}));
        assert!(responses[2].get("error").is_none());

        assert_eq!(responses[3]["error"]["code"], -32601);
        assert!(responses[3].get("result").is_none());
    }

    #[tokio::test]
    async fn test_requests_before_initialize_are_rejected() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
                call(json!(2), "getWeather", json!({"city": "Seoul"})),
                initialize(json!(3)),
                json!({"jsonrpc": "2.0", "id": 4, "method": "tools/list"}),
            ],
        )
        .await;

        assert_eq!(responses[0]["error"]["code"], -32002);
        assert_eq!(responses[1]["error"]["code"], -32002);
        assert!(responses[2]["result"].is_object());
        assert!(responses[3]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn test_initialize_twice() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                initialize(json!(2)),
                json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}),
            ],
        )
        .await;

        assert_eq!(responses[0]["result"], responses[1]["result"]);
        assert!(responses[2]["result"]["tools"].is_array());
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
                json!({"jsonrpc": "2.0", "method": "tools/call", "params": {"name": "getWeather"}}),
                json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}),
            ],
        )
        .await;

        assert_eq!(ids(&responses), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_ids_are_echoed_verbatim() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!(0)),
                json!({"jsonrpc": "2.0", "id": 42, "method": "ping"}),
                json!({"jsonrpc": "2.0", "id": "req-7", "method": "tools/list"}),
                json!({"jsonrpc": "2.0", "id": -3, "method": "unknown/method"}),
                call(json!(9007199254740993u64), "invalidTool", json!({})),
            ],
        )
        .await;

        assert_eq!(
            ids(&responses),
            vec![json!(0), json!(42), json!("req-7"), json!(-3), json!(9007199254740993u64)]
        );
        assert_eq!(responses[3]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn test_pipelined_calls_answer_in_arrival_order() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                call(json!(2), "sleep", json!({"ms": 200})),
                json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
                call(json!(4), "sleep", json!({"ms": 0})),
                call(json!(5), "getWeather", json!({"city": "Seoul"})),
            ],
        )
        .await;

        assert_eq!(ids(&responses), vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        assert_eq!(responses[1]["result"]["slept_ms"], 200);
        assert_eq!(responses[4]["result"]["temp"], 18);
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        let server = test_server(Duration::from_secs(5));
        let started = Instant::now();
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                call(json!(2), "sleep", json!({"ms": 200})),
                call(json!(3), "sleep", json!({"ms": 200})),
            ],
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(ids(&responses), vec![json!(1), json!(2), json!(3)]);
        assert!(elapsed < Duration::from_millis(380), "calls ran one after another: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_single_in_flight_slot_keeps_order() {
        let server = test_server_with(ServerConfig {
            max_in_flight: 1,
            ..ServerConfig::default()
        });
        let started = Instant::now();
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                call(json!(2), "sleep", json!({"ms": 150})),
                call(json!(3), "sleep", json!({"ms": 150})),
                call(json!(4), "getWeather", json!({"city": "Seoul"})),
                call(json!(5), "fail", json!({})),
                json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}),
            ],
        )
        .await;
        let elapsed = started.elapsed();

        assert_eq!(
            ids(&responses),
            vec![json!(1), json!(2), json!(3), json!(4), json!(5), json!(9)]
        );
        assert_eq!(responses[3]["result"]["temp"], 18);
        assert_eq!(responses[4]["error"]["code"], -32050);
        assert_eq!(responses[5]["result"], json!({}));
        // One slot means the two sleeps cannot overlap
        assert!(elapsed >= Duration::from_millis(300), "calls overlapped: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_output_failure_aborts_running_calls() {
        let started = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool).expect("register sleep");
        registry
            .register(TrackedTool {
                started: Arc::clone(&started),
                finished: Arc::clone(&finished),
            })
            .expect("register tracked");
        let server = ToolServer::with_registry(ServerConfig::default(), registry).expect("Failed to create server");

        let input = frames(&[
            initialize(json!(1)),
            call(json!(2), "sleep", json!({"ms": 50})),
            call(json!(3), "tracked", json!({})),
        ]);
        let outcome = server.serve(&input[..], ClosesAfterFirstFlush::default()).await;
        assert!(matches!(outcome, Err(ServerError::Framing(_))), "{:?}", outcome);
        assert!(started.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!finished.load(Ordering::SeqCst), "tool kept running after the connection failed");
    }

    #[tokio::test]
    async fn test_panicking_tool_is_contained() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                call(json!(2), "explode", json!({})),
                json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}),
            ],
        )
        .await;

        assert_eq!(responses[1]["error"]["code"], -32603);
        assert_eq!(responses[2]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_slow_tool_times_out() {
        let server = test_server(Duration::from_millis(100));
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                call(json!(2), "sleep", json!({"ms": 10_000})),
                call(json!(3), "sleep", json!({"ms": 1})),
            ],
        )
        .await;

        assert_eq!(responses[1]["error"]["code"], -32001);
        assert_eq!(responses[2]["result"]["slept_ms"], 1);
    }

    #[tokio::test]
    async fn test_tool_failure_is_forwarded() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(server, &[initialize(json!(1)), call(json!(2), "fail", json!({}))]).await;

        assert_eq!(responses[1]["error"]["code"], -32050);
        assert_eq!(responses[1]["error"]["message"], "backend unavailable");
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_before_invoke() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                call(json!(2), "getWeather", json!({})),
                call(json!(3), "getWeather", json!({"city": 7})),
                json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"arguments": {}}}),
            ],
        )
        .await;

        for response in &responses[1..] {
            assert_eq!(response["error"]["code"], -32602);
        }
    }

    #[tokio::test]
    async fn test_tools_list_unaffected_by_calls() {
        let server = test_server(Duration::from_secs(5));
        let list = json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"});
        let responses = exchange(
            server,
            &[
                initialize(json!(1)),
                list.clone(),
                call(json!(2), "getWeather", json!({"city": "Seoul"})),
                call(json!(3), "fail", json!({})),
                call(json!(4), "invalidTool", json!({})),
                list,
            ],
        )
        .await;

        assert_eq!(responses[1]["result"], responses[5]["result"]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_dropped() {
        let server = test_server(Duration::from_secs(5));
        let mut input = frames(&[initialize(json!(1))]);
        input.extend_from_slice(b"Content-Length: 5\r\n\r\n{oops");
        input.extend(frames(&[json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})]));

        let (responses, outcome) = exchange_raw(server, input).await;
        assert!(outcome.is_ok());
        assert_eq!(ids(&responses), vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn test_invalid_request_with_id_gets_error() {
        let server = test_server(Duration::from_secs(5));
        let responses = exchange(
            server,
            &[
                json!({"id": 1, "method": "initialize"}),
                json!({"jsonrpc": "2.0", "id": 2, "method": ["initialize"]}),
                json!({"jsonrpc": "2.0", "method": 5}),
            ],
        )
        .await;

        assert_eq!(ids(&responses), vec![json!(1), json!(2)]);
        assert_eq!(responses[0]["error"]["code"], -32600);
        assert_eq!(responses[1]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_framing_error_closes_connection() {
        let server = test_server(Duration::from_secs(5));
        let mut input = frames(&[initialize(json!(1))]);
        input.extend_from_slice(b"Content-Length: abc\r\n\r\n{}");
        input.extend(frames(&[json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})]));

        let (responses, outcome) = exchange_raw(server, input).await;
        assert_eq!(ids(&responses), vec![json!(1)]);
        assert!(matches!(
            outcome,
            Err(ServerError::Framing(FramingError::InvalidContentLength(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_input_ends_cleanly() {
        let server = test_server(Duration::from_secs(5));
        let (responses, outcome) = exchange_raw(server, Vec::new()).await;
        assert!(responses.is_empty());
        assert!(outcome.is_ok());
    }
}
