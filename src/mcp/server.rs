use crate::app::App;
use crate::constants::server::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use crate::errors::{ErrorCode, McpError, ToolError};
use crate::mcp::envelope::build_generic_envelope;
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::utils::feature_flags::is_startup_autoregister_enabled;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

fn to_line<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string())
}

pub struct McpServer {
    app: Arc<App>,
    in_flight: AtomicUsize,
}

impl McpServer {
    pub fn new(app: Arc<App>) -> Self {
        Self {
            app,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Request tasks spawned by `serve` that have not been reaped yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub async fn from_env() -> Result<Self, ToolError> {
        let app = App::initialize()?;
        let server = Self::new(Arc::new(app));
        if is_startup_autoregister_enabled() {
            server.startup_auto_register().await;
        }
        Ok(server)
    }

    /// Failures are logged; the fixed tools stay usable.
    async fn startup_auto_register(&self) {
        match self.app.auto_register_all().await {
            Ok(summary) => self.app.logger.info(
                "startup auto-registration finished",
                Some(&serde_json::json!(summary)),
            ),
            Err(err) => self.app.logger.warn(
                "startup auto-registration failed",
                Some(&serde_json::json!({"code": err.code, "message": err.message})),
            ),
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": self.app.registry.list() })
    }

    async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        let payload = self
            .app
            .registry
            .execute(name, args)
            .await
            .map_err(|err| McpError::from_tool_error(name, &err))?;

        let meta = payload.get("meta");
        let tool_result = payload.get("result").cloned().unwrap_or(Value::Null);
        let envelope = build_generic_envelope(name, &tool_result, meta);

        Ok(serde_json::json!({
            "content": [ { "type": "text", "text": serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string()) } ]
        }))
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        match request.method.as_str() {
            "notifications/initialized" => request
                .id
                .map(|id| JsonRpcResponse::success(id, serde_json::json!({}))),
            _ if request.method.starts_with("notifications/") && request.id.is_none() => None,
            "initialize" => request
                .id
                .map(|id| JsonRpcResponse::success(id, self.handle_initialize())),
            "ping" => request
                .id
                .map(|id| JsonRpcResponse::success(id, serde_json::json!({}))),
            "tools/list" => request
                .id
                .map(|id| JsonRpcResponse::success(id, self.handle_tools_list())),
            "tools/call" => {
                let id = request.id?;
                let params = request.params.as_object().cloned().unwrap_or_default();
                let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                if name.is_empty() {
                    return Some(JsonRpcResponse::failure(
                        id,
                        ErrorCode::InvalidParams.as_i32(),
                        "Missing tool name".to_string(),
                    ));
                }
                let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                Some(match self.handle_tools_call(name, args).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::failure(id, err.code.as_i32(), err.message),
                })
            }
            _ => request.id.map(|id| {
                JsonRpcResponse::failure(
                    id,
                    ErrorCode::MethodNotFound.as_i32(),
                    "Method not found".to_string(),
                )
            }),
        }
    }

    /// Handles one input line and returns the lines to write back: the
    /// response (if any) followed by `tools/list_changed` when the call grew
    /// the registry.
    pub async fn handle_message(&self, line: &str) -> Vec<String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let parsed: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) => {
                return vec![to_line(&JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::ParseError.as_i32(),
                    "Parse error".to_string(),
                ))];
            }
        };
        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(req) => req,
            Err(_) => {
                return vec![to_line(&JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::InvalidRequest.as_i32(),
                    "Invalid request".to_string(),
                ))];
            }
        };

        let generation = self.app.registry.generation();
        let mut out = Vec::new();
        if let Some(response) = self.dispatch(request).await {
            out.push(to_line(&response));
        }
        if self.app.registry.generation() != generation {
            out.push(to_line(&JsonRpcNotification::new(TOOLS_LIST_CHANGED)));
        }
        out
    }

    /// Requests are dispatched concurrently so a `mold_cancelJobWait` can
    /// reach a wait that is still in flight. Finished request tasks are reaped
    /// while reading. Output lines go through a single writer task.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(payload) = rx.recv().await {
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let mut in_flight = JoinSet::new();
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                line = lines.next_line() => {
                    let Some(line) = line.map_err(|err| ToolError::internal(err.to_string()))? else {
                        break;
                    };
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        for payload in server.handle_message(&line).await {
                            if tx.send(payload).is_err() {
                                break;
                            }
                        }
                    });
                }
            }
            self.in_flight.store(in_flight.len(), Ordering::Relaxed);
        }

        while in_flight.join_next().await.is_some() {
            self.in_flight.store(in_flight.len(), Ordering::Relaxed);
        }
        drop(tx);
        writer_task
            .await
            .map_err(|err| ToolError::internal(err.to_string()))??;
        Ok(())
    }

    pub async fn run_stdio(self: Arc<Self>) -> Result<(), ToolError> {
        self.app.logger.info(
            "serving on stdio",
            Some(&serde_json::json!({
                "tools": self.app.registry.len(),
                "config_file": self.app.config.file_path(),
            })),
        );
        self.serve(
            BufReader::new(tokio::io::stdin()),
            BufWriter::new(tokio::io::stdout()),
        )
        .await
    }
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let server = Arc::new(McpServer::from_env().await?);
    server.run_stdio().await
}
