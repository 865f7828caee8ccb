//! Final URL lookup for a finished job.

use super::api::ClipHostApi;
use super::token::TokenManager;
use crate::error::{ClipError, ClipResult};
use std::sync::Arc;

/// Reads the playable URL of a completed job
pub struct ClipResolver {
    api: Arc<dyn ClipHostApi>,
    tokens: Arc<TokenManager>,
}

impl ClipResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(api: Arc<dyn ClipHostApi>, tokens: Arc<TokenManager>) -> Self {
        Self { api, tokens }
    }

    /// Fetch the `webmUrl` of `job_id`.
    ///
    /// # Errors
    ///
    /// Any remote failure is `NonRetryable`; `Critical` comes from credential issuance.
    pub async fn fetch(&self, job_id: &str) -> ClipResult<String> {
        let credential = self.tokens.ensure().await?;
        self.api
            .fetch(credential.access_token(), job_id)
            .await
            .map_err(|e| ClipError::non_retryable(format!("could not resolve clip {job_id}: {e}")))
    }
}
