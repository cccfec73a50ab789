//! Line-delimited JSON protocol over stdio.
//!
//! Each input line is one [`RouteRequest`]; each request produces exactly
//! one [`RouteResponse`] line on the output.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{error_response, handle_route, SharedState};
use crate::error::ErrorCode;

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod protocol_tests;

/// One routed request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Caller-supplied correlation id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// `history` or `transaction`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, deserialize_with = "string_map")]
    pub path_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub query_parameters: HashMap<String, String>,
}

impl RouteRequest {
    /// Request for a resource.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: Some(resource.into()),
            ..Default::default()
        }
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.insert(key.into(), value.into());
        self
    }

    /// Add a path parameter.
    pub fn with_path(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters.insert(key.into(), value.into());
        self
    }

    /// Set the correlation id.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// The caller's id, or a fresh one.
    pub fn request_id(&self) -> String {
        self.request_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Parameter maps accept scalar values and render them as strings;
/// `null` entries are dropped.
fn string_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, Value>> = Option::deserialize(deserializer)?;
    let mut params = HashMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let rendered = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other @ (Value::Array(_) | Value::Object(_)) => {
                return Err(serde::de::Error::custom(format!(
                    "parameter '{}' must be a scalar, found {}",
                    key, other
                )))
            }
        };
        params.insert(key, rendered);
    }
    Ok(params)
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub request_id: String,
    /// HTTP-equivalent status.
    pub status_code: u16,
    /// Success payload or error envelope.
    pub body: Value,
}

impl RouteResponse {
    pub fn new(request_id: String, status_code: u16, body: Value) -> Self {
        Self {
            request_id,
            status_code,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// History server running over stdio.
pub struct HistoryServer {
    state: SharedState,
}

impl HistoryServer {
    /// Create a new server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Run the server using async stdio
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Verification history server starting...");
        let reader = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.serve(reader, &mut stdout).await
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    pub async fn serve<R, W>(&self, mut reader: R, writer: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let bytes_read = reader.read_until(b'\n', &mut buf).await?;

            // EOF reached
            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!(request = %trimmed, "Received request");
                    self.handle_line(trimmed).await
                }
                Err(e) => {
                    error!(error = %e, "Request line is not valid UTF-8");
                    error_response(
                        Uuid::new_v4().to_string(),
                        ErrorCode::InvalidRequest,
                        format!("Invalid request: {}", e),
                    )
                }
            };

            let response_json = serde_json::to_string(&response)?;
            debug!(status = response.status_code, "Sending response");

            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }

        Ok(())
    }

    /// Decode and route a single request line.
    pub async fn handle_line(&self, line: &str) -> RouteResponse {
        match serde_json::from_str::<RouteRequest>(line) {
            Ok(request) => handle_route(&self.state, request).await,
            Err(e) => {
                error!(error = %e, "Failed to parse request");
                error_response(
                    Uuid::new_v4().to_string(),
                    ErrorCode::InvalidRequest,
                    format!("Invalid request: {}", e),
                )
            }
        }
    }
}
