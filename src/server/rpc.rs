//! Line-delimited JSON-RPC 2.0 driver.
//!
//! Each request line is one trigger against the orchestrator; every
//! `survey/*` reply carries the full view so a client can render without
//! tracking state.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::{handle_survey_call, SharedState};
use crate::error::ProtocolError;

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod rpc_tests;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier (null if the request could not be parsed).
    pub id: Value,
    /// The result on success (mutually exclusive with error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure (mutually exclusive with result).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

impl ProtocolError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::UnknownMethod { .. } => -32601,
            ProtocolError::InvalidParameters { .. } => -32602,
            ProtocolError::Json(_) => -32603,
        }
    }
}

/// Reply future of the request currently being driven.
type PendingReply<'a> = Pin<Box<dyn Future<Output = Option<JsonRpcResponse>> + 'a>>;

async fn poll_in_flight(slot: &mut Option<PendingReply<'_>>) -> Option<JsonRpcResponse> {
    match slot {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

/// Write one reply line. Notifications get no response.
async fn write_response<W>(writer: &mut W, response: Option<JsonRpcResponse>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(response) = response else {
        return Ok(());
    };
    let response_json = serde_json::to_string(&response)?;
    debug!(response = %response_json, "Sending response");

    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Survey driver running over stdio.
pub struct SurveyServer {
    state: SharedState,
}

impl SurveyServer {
    /// Create a new driver
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve stdin/stdout until EOF
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        self.serve(BufReader::new(stdin), stdout).await
    }

    /// Serve line-delimited requests from `reader`, writing replies to `writer`.
    ///
    /// Input keeps being read while a transition plays, so a trigger that
    /// arrives mid-transition reaches the orchestrator and is dropped there
    /// instead of waiting for the commit. Replies to requests read during a
    /// transition can precede the transition's own reply; match them by id.
    ///
    /// On EOF the in-flight request finishes, then the orchestrator is shut
    /// down so no auto-advance fires after the client has gone and queued
    /// snapshots are attempted.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(survey = self.state.orchestrator.graph().name(), "Survey driver ready");
        let mut lines = reader.lines();
        let mut in_flight: Option<PendingReply<'_>> = None;

        loop {
            tokio::select! {
                biased;

                response = poll_in_flight(&mut in_flight), if in_flight.is_some() => {
                    in_flight = None;
                    write_response(&mut writer, response).await?;
                }

                line = lines.next_line() => {
                    // EOF reached
                    let Some(line) = line? else {
                        info!("EOF received, shutting down");
                        break;
                    };

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    debug!(request = %trimmed, "Received request");

                    match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                        Ok(request) if in_flight.is_none() => {
                            in_flight = Some(Box::pin(self.handle_request(request)));
                        }
                        // Only a playing transition stays pending, so this
                        // request settles without awaiting the player
                        Ok(request) => {
                            let response = self.handle_request(request).await;
                            write_response(&mut writer, response).await?;
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to parse request");
                            let response = JsonRpcResponse::error(
                                None,
                                -32700,
                                format!("Parse error: {}", e),
                            );
                            write_response(&mut writer, Some(response)).await?;
                        }
                    }
                }
            }
        }

        if let Some(pending) = in_flight.take() {
            let response = pending.await;
            write_response(&mut writer, response).await?;
        }

        self.state.orchestrator.shutdown().await;
        Ok(())
    }

    /// Handle a single JSON-RPC request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            warn!(version = %request.jsonrpc, "Unexpected JSON-RPC version");
        }
        let is_notification = request.id.is_none();

        let result = match request.method.as_str() {
            "ping" => Ok(Value::Object(Default::default())),
            method if method.starts_with("survey/") => {
                handle_survey_call(&self.state, method, request.params).await
            }
            method => Err(ProtocolError::UnknownMethod {
                method: method.to_string(),
            }),
        };

        if is_notification {
            if let Err(e) = &result {
                debug!(error = %e, "Notification failed, ignoring");
            }
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                error!(method = %request.method, error = %e, "Request failed");
                JsonRpcResponse::error(request.id, e.code(), e.to_string())
            }
        })
    }
}
