//! HTTP utilities for Kubernetes REST API calls

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const JSON: &str = "application/json";
const MERGE_PATCH: &str = "application/merge-patch+json";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Non-success response from the API server
#[derive(Debug, thiserror::Error)]
#[error("API request failed: {status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    /// `message` of the returned `Status` object, if any
    pub message: String,
}

#[derive(Deserialize)]
struct StatusBody {
    #[serde(default)]
    message: String,
}

/// HTTP client wrapper for Kubernetes API calls
#[derive(Clone)]
pub struct KubeHttpClient {
    client: Client,
}

impl KubeHttpClient {
    /// Create a new HTTP client
    pub fn new(ca_cert: Option<&Path>, insecure: bool) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("meshconf/", env!("CARGO_PKG_VERSION")));

        if let Some(path) = ca_cert {
            let pem = std::fs::read(path)
                .with_context(|| format!("Failed to read CA certificate {:?}", path))?;
            let cert = reqwest::Certificate::from_pem(&pem).context("Invalid CA certificate")?;
            builder = builder.add_root_certificate(cert);
        }

        if insecure {
            tracing::warn!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: Option<&str>) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url), token).await
    }

    /// Make a POST request with a raw JSON body
    pub async fn post(&self, url: &str, token: Option<&str>, body: &str) -> Result<Value> {
        tracing::debug!("POST {}", url);
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON)
            .body(body.to_string());
        self.send(request, token).await
    }

    /// Make a JSON merge-patch request
    pub async fn patch(&self, url: &str, token: Option<&str>, body: &str) -> Result<Value> {
        tracing::debug!("PATCH {}", url);
        let request = self
            .client
            .patch(url)
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body.to_string());
        self.send(request, token).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: Option<&str>) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url), token).await
    }

    async fn send(&self, mut request: RequestBuilder, token: Option<&str>) -> Result<Value> {
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let message = serde_json::from_str::<StatusBody>(&body)
                .map(|s| s.message)
                .unwrap_or_default();
            return Err(ApiError { status, message }.into());
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format a cluster API error for display
pub fn format_api_error(error: &anyhow::Error) -> String {
    if let Some(api) = error.downcast_ref::<ApiError>() {
        return match api.status {
            StatusCode::UNAUTHORIZED => {
                "Authentication failed. Check the configured token.".to_string()
            },
            StatusCode::FORBIDDEN => {
                "Permission denied. Check your RBAC permissions.".to_string()
            },
            StatusCode::NOT_FOUND => "Resource not found.".to_string(),
            StatusCode::CONFLICT => {
                "Resource conflict. The resource may already exist or have changed.".to_string()
            },
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
                if api.message.is_empty() {
                    "Invalid request. Check the resource body.".to_string()
                } else {
                    format!("Invalid request: {}", sanitize_for_log(&api.message))
                }
            },
            StatusCode::TOO_MANY_REQUESTS => {
                "Rate limit exceeded. Please try again later.".to_string()
            },
            s if s.is_server_error() => {
                "API server temporarily unavailable. Please try again.".to_string()
            },
            s => format!("Request failed with status {}.", s),
        };
    }

    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(120)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
