//! HTTP request tool.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use braid_agent::{RunContext, Tool, ToolError, ToolResult};

/// Default request timeout when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Makes HTTP requests to external APIs.
///
/// Input format is `METHOD|URL|BODY` with the body optional, e.g.
/// `GET|https://api.example.com/data` or
/// `POST|https://api.example.com/items|{"name":"x"}`.
#[derive(Debug, Clone)]
pub struct HttpRequestTool {
    client: reqwest::Client,
}

impl HttpRequestTool {
    /// Create the tool with the default timeout.
    pub fn new() -> ToolResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create the tool with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> ToolResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("braid-agent/0.1")
            .build()
            .map_err(|e| ToolError::Invalid {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Makes HTTP requests to external APIs. Input format: METHOD|URL|BODY (body optional)"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "HTTP request in format: METHOD|URL|BODY (body optional)",
                }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, ctx: &RunContext, input: &str) -> ToolResult<String> {
        let mut parts = input.splitn(3, '|');
        let method_str = parts.next().unwrap_or_default().trim().to_uppercase();
        let url = parts.next().unwrap_or_default().trim().to_owned();
        let body = parts.next().unwrap_or_default().to_owned();

        if method_str.is_empty() || url.is_empty() {
            return Err(ToolError::InvalidInput {
                reason: "expected METHOD|URL|BODY (body optional)".into(),
            });
        }

        let method = reqwest::Method::from_bytes(method_str.as_bytes()).map_err(|_| {
            ToolError::InvalidInput {
                reason: format!("invalid HTTP method: {method_str}"),
            }
        })?;

        let mut request = self.client.request(method.clone(), &url);
        if !body.is_empty() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        tracing::debug!(method = %method, url = %url, "executing http_request tool");

        let response = ctx
            .guard(request.send())
            .await
            .map_err(|e| ToolError::Execution {
                reason: e.to_string(),
            })?
            .map_err(|e| ToolError::Execution {
                reason: format!("request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ToolError::Execution {
            reason: format!("failed to read response: {e}"),
        })?;

        Ok(format!("Status: {status}\nBody: {body}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
