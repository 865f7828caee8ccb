//! Fetch-and-encode submission.

use super::api::{ApiError, ClipHostApi, Cut, UploadRequest};
use super::token::TokenManager;
use crate::config::CLIP_DURATION_SECS;
use crate::error::{ClipError, ClipResult};
use reqwest::Url;
use std::sync::Arc;
use tracing::{info, warn};

/// Submits clip jobs to the remote service
pub struct ClipUploader {
    api: Arc<dyn ClipHostApi>,
    tokens: Arc<TokenManager>,
}

impl ClipUploader {
    /// Create an uploader sharing `tokens` with the rest of the pipeline.
    #[must_use]
    pub fn new(api: Arc<dyn ClipHostApi>, tokens: Arc<TokenManager>) -> Self {
        Self { api, tokens }
    }

    /// Submit a 15-second clip of `link` starting at `start_offset` seconds.
    ///
    /// # Errors
    ///
    /// - `Retryable` on a non-success status or transport fault.
    /// - `NonRetryable` if the request cannot be built or the reply cannot be read.
    /// - `Critical` from credential issuance.
    pub async fn submit(&self, link: &str, start_offset: u32) -> ClipResult<String> {
        let credential = self.tokens.ensure().await?;

        // Validate only; the service gets the link exactly as written.
        Url::parse(link).map_err(|e| {
            ClipError::non_retryable(format!("invalid source link {link}: {e}"))
        })?;
        let request = UploadRequest {
            fetch_url: link.to_string(),
            cut: Cut {
                duration: CLIP_DURATION_SECS,
                start: start_offset,
            },
        };

        match self.api.upload(credential.access_token(), &request).await {
            Ok(job_id) => {
                info!(link, job_id = %job_id, start = start_offset, "Clip upload accepted");
                Ok(job_id)
            }
            Err(e @ (ApiError::Status { .. } | ApiError::Network(_))) => {
                warn!(link, error = %e, "Clip upload failed, will retry");
                Err(ClipError::retryable(format!("upload of {link} failed: {e}")))
            }
            Err(e @ (ApiError::Decode(_) | ApiError::Request(_))) => Err(
                ClipError::non_retryable(format!("upload of {link} could not be processed: {e}")),
            ),
        }
    }
}
