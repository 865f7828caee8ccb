//! Clip-hosting REST client
//!
//! [`ClipHostApi`] is the seam between the pipeline and the remote service;
//! [`GfycatClient`] is the reqwest implementation used in production.

use crate::config::ClipSettings;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Error bodies longer than this are truncated before being carried in errors.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Outcome of a failed remote call, before pipeline classification.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Sanitised response body
        body: String,
    },
    /// Connection, timeout or other transport fault
    #[error("Network error: {0}")]
    Network(String),
    /// The response could not be interpreted
    #[error("Decode error: {0}")]
    Decode(String),
    /// The request could not be built
    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if e.is_builder() {
            Self::Request(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Access token as issued by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    /// Bearer token
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Trim window of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cut {
    /// Clip length in seconds
    pub duration: u32,
    /// Offset into the source in seconds
    pub start: u32,
}

/// Body of a fetch-and-encode request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    /// Source video link
    #[serde(rename = "fetchUrl")]
    pub fetch_url: String,
    /// Trim window
    pub cut: Cut,
}

/// Status document of a remote job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobMetadata {
    /// `complete`, `encoding` or anything else the service reports
    #[serde(default)]
    pub task: String,
    /// Remaining fields, kept for logging
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobMetadata {
    /// Metadata carrying only a task state.
    #[must_use]
    pub fn with_task(task: &str) -> Self {
        Self {
            task: task.to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    gfyname: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchResponse {
    gfy_item: GfyItem,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GfyItem {
    webm_url: String,
}

/// Remote operations consumed by the pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipHostApi: Send + Sync {
    /// Issue a client-credentials access token.
    async fn issue_token(&self, client_id: &str, client_secret: &str)
        -> Result<TokenGrant, ApiError>;

    /// Submit a fetch-and-encode job, returning the remote job id.
    async fn upload(&self, token: &str, request: &UploadRequest) -> Result<String, ApiError>;

    /// Read the status document of a job.
    async fn status(&self, token: &str, job_id: &str) -> Result<JobMetadata, ApiError>;

    /// Read the playable URL of a finished job.
    async fn fetch(&self, token: &str, job_id: &str) -> Result<String, ApiError>;
}

/// reqwest-backed client for the gfycat-compatible REST API
pub struct GfycatClient {
    http: HttpClient,
    base: String,
}

impl GfycatClient {
    /// Create a client for `base` (e.g. `https://api.gfycat.com/v1`).
    #[must_use]
    pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a client from settings.
    #[must_use]
    pub fn from_settings(settings: &ClipSettings) -> Self {
        Self::new(settings.api_base(), settings.http_timeout())
    }

    fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base)
    }

    fn upload_url(&self) -> String {
        format!("{}/gfycats", self.base)
    }

    fn status_url(&self, job_id: &str) -> String {
        format!("{}/gfycats/fetch/status/{job_id}", self.base)
    }

    fn fetch_url(&self, job_id: &str) -> String {
        format!("{}/gfycats/{job_id}", self.base)
    }
}

#[async_trait]
impl ClipHostApi for GfycatClient {
    async fn issue_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, ApiError> {
        let body = serde_json::json!({
            "grant_type": "client_credentials",
            "client_id": client_id,
            "client_secret": client_secret,
        });
        let response = self.http.post(self.token_url()).json(&body).send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn upload(&self, token: &str, request: &UploadRequest) -> Result<String, ApiError> {
        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        let parsed: UploadResponse = ensure_success(response).await?.json().await?;
        Ok(parsed.gfyname)
    }

    async fn status(&self, token: &str, job_id: &str) -> Result<JobMetadata, ApiError> {
        let response = self
            .http
            .get(self.status_url(job_id))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn fetch(&self, token: &str, job_id: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .get(self.fetch_url(job_id))
            .bearer_auth(token)
            .send()
            .await?;
        let parsed: FetchResponse = ensure_success(response).await?.json().await?;
        Ok(parsed.gfy_item.webm_url)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), "Clip host returned an error status");
    Err(ApiError::Status {
        status: status.as_u16(),
        body: sanitize_error_body(&body),
    })
}

/// Strip HTML error pages and truncate long bodies.
fn sanitize_error_body(body: &str) -> String {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        return "(server returned HTML error page)".to_string();
    }
    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return format!("{truncated}... (truncated)");
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_request_wire_shape() {
        let request = UploadRequest {
            fetch_url: "https://youtu.be/abc123".to_string(),
            cut: Cut {
                duration: 15,
                start: 42,
            },
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "fetchUrl": "https://youtu.be/abc123",
                "cut": { "duration": 15, "start": 42 }
            })
        );
    }

    #[test]
    fn status_document_keeps_extra_fields() {
        let meta: JobMetadata =
            serde_json::from_str(r#"{"task":"encoding","time":12}"#).expect("parse");
        assert_eq!(meta.task, "encoding");
        assert_eq!(meta.extra.get("time"), Some(&serde_json::json!(12)));

        let meta: JobMetadata = serde_json::from_str(r#"{"errorMessage":"x"}"#).expect("parse");
        assert_eq!(meta.task, "");
    }

    #[test]
    fn sanitize_html_and_long_bodies() {
        assert_eq!(
            sanitize_error_body("<!DOCTYPE html><html>502</html>"),
            "(server returned HTML error page)"
        );
        let long = "x".repeat(600);
        let clean = sanitize_error_body(&long);
        assert!(clean.ends_with("... (truncated)"));
        assert_eq!(clean.chars().filter(|c| *c == 'x').count(), 500);
        assert_eq!(sanitize_error_body("bad grant"), "bad grant");
    }

    #[test]
    fn endpoint_urls() {
        let client = GfycatClient::new("https://api.example.com/v1/", Duration::from_secs(1));
        assert_eq!(client.token_url(), "https://api.example.com/v1/oauth/token");
        assert_eq!(client.upload_url(), "https://api.example.com/v1/gfycats");
        assert_eq!(
            client.status_url("xyz"),
            "https://api.example.com/v1/gfycats/fetch/status/xyz"
        );
        assert_eq!(client.fetch_url("xyz"), "https://api.example.com/v1/gfycats/xyz");
    }
}
