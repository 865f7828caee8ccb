//! Bounded retry around one Upload→Poll→Fetch attempt.

use super::api::{ClipHostApi, GfycatClient};
use super::job::ClipJob;
use super::poller::{PollPolicy, StatusPoller};
use super::resolver::ClipResolver;
use super::token::{ClientCredentials, TokenManager};
use super::uploader::ClipUploader;
use crate::config::{ClipSettings, CONVERT_MAX_ATTEMPTS};
use crate::error::{ClipError, ClipResult, ErrorKind};
use crate::links::SourceLink;
use std::sync::Arc;
use tracing::{info, warn};

/// Converts a link into a hosted clip, retrying transient failures.
///
/// `Retryable` never leaves [`RetryController::convert`]: it either turns
/// into another attempt or, once attempts run out, into `NonRetryable`.
pub struct RetryController {
    uploader: ClipUploader,
    poller: StatusPoller,
    resolver: ClipResolver,
    max_attempts: usize,
}

impl RetryController {
    /// Build the pipeline around a shared API client and token manager.
    #[must_use]
    pub fn new(api: Arc<dyn ClipHostApi>, tokens: Arc<TokenManager>, policy: PollPolicy) -> Self {
        Self {
            uploader: ClipUploader::new(api.clone(), tokens.clone()),
            poller: StatusPoller::new(api.clone(), tokens.clone(), policy),
            resolver: ClipResolver::new(api, tokens),
            max_attempts: CONVERT_MAX_ATTEMPTS,
        }
    }

    /// Build the production pipeline from settings.
    #[must_use]
    pub fn from_settings(settings: &ClipSettings) -> Self {
        let api: Arc<dyn ClipHostApi> = Arc::new(GfycatClient::from_settings(settings));
        let tokens = Arc::new(TokenManager::new(
            api.clone(),
            ClientCredentials {
                client_id: settings.clip_client_id.clone(),
                client_secret: settings.clip_client_secret.clone(),
            },
        ));
        Self::new(api, tokens, PollPolicy::default())
    }

    /// Convert `link`, returning the playable clip URL.
    ///
    /// # Errors
    ///
    /// - `NonRetryable` if the link cannot be converted or every attempt
    ///   ended in a retryable failure.
    /// - `Critical` if credential issuance is broken.
    pub async fn convert(&self, link: &SourceLink) -> ClipResult<String> {
        for attempt in 1..=self.max_attempts {
            let mut job = ClipJob::new(link.clone());
            match self.attempt(&mut job).await {
                Ok(url) => {
                    info!(link = %link.url, attempt, url = %url, "Clip ready");
                    return Ok(url);
                }
                Err(e) => {
                    job.failed();
                    if e.kind() != ErrorKind::Retryable {
                        return Err(e);
                    }
                    warn!(
                        link = %link.url,
                        attempt,
                        max_attempts = self.max_attempts,
                        job_id = job.remote_job_id.as_deref().unwrap_or("-"),
                        "Clip attempt failed: {e}"
                    );
                }
            }
        }

        Err(ClipError::non_retryable(format!(
            "exhausted {} attempts for {}",
            self.max_attempts, link.url
        )))
    }

    async fn attempt(&self, job: &mut ClipJob) -> ClipResult<String> {
        let job_id = self
            .uploader
            .submit(&job.source.url, job.source.start_offset)
            .await?;
        job.submitted(job_id.clone());

        job.encoding();
        self.poller.await_completion(&job_id).await?;

        let url = self.resolver.fetch(&job_id).await?;
        job.completed(url.clone());
        Ok(url)
    }
}
