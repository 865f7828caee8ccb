//! Waiting for the remote encoder.

use super::api::{ApiError, ClipHostApi, JobMetadata};
use super::token::TokenManager;
use crate::config::{POLL_INTERVAL_SECS, POLL_MAX_WAIT_SECS};
use crate::error::{ClipError, ClipResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TASK_COMPLETE: &str = "complete";
const TASK_ENCODING: &str = "encoding";

/// Fixed cadence and ceiling for status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between checks
    pub interval: Duration,
    /// Total time allowed while the job is still encoding
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
            max_wait: Duration::from_secs(POLL_MAX_WAIT_SECS),
        }
    }
}

impl PollPolicy {
    /// Number of status checks the budget allows.
    #[must_use]
    pub fn max_checks(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        u32::try_from(self.max_wait.as_millis() / interval).unwrap_or(u32::MAX)
    }
}

/// Polls a submitted job until it completes or the budget runs out
pub struct StatusPoller {
    api: Arc<dyn ClipHostApi>,
    tokens: Arc<TokenManager>,
    policy: PollPolicy,
}

impl StatusPoller {
    /// Create a poller with the given policy.
    #[must_use]
    pub fn new(api: Arc<dyn ClipHostApi>, tokens: Arc<TokenManager>, policy: PollPolicy) -> Self {
        Self {
            api,
            tokens,
            policy,
        }
    }

    /// Wait for `job_id` to reach `complete`.
    ///
    /// The sleep between checks yields to the runtime, so other jobs keep
    /// progressing while this one waits.
    ///
    /// # Errors
    ///
    /// - `Retryable` if the remote reports any other task state, answers
    ///   with an error status or cannot be reached.
    /// - `NonRetryable` if the job is still encoding when the budget is
    ///   exhausted, or the status document cannot be read.
    /// - `Critical` from credential issuance.
    pub async fn await_completion(&self, job_id: &str) -> ClipResult<JobMetadata> {
        let credential = self.tokens.ensure().await?;

        for check in 1..=self.policy.max_checks() {
            let status = self
                .api
                .status(credential.access_token(), job_id)
                .await
                .map_err(|e| classify_status_error(job_id, &e))?;
            debug!(job_id, check, task = %status.task, "Checked clip job status");

            match status.task.as_str() {
                TASK_COMPLETE => {
                    info!(job_id, check, "Clip job complete");
                    return Ok(status);
                }
                TASK_ENCODING => tokio::time::sleep(self.policy.interval).await,
                other => {
                    return Err(ClipError::retryable(format!(
                        "clip job {job_id} reported task state {other:?}"
                    )));
                }
            }
        }

        Err(ClipError::non_retryable(format!(
            "timed out after {}s while clip job {job_id} was encoding; the source is probably too large",
            self.policy.max_wait.as_secs()
        )))
    }
}

fn classify_status_error(job_id: &str, e: &ApiError) -> ClipError {
    match e {
        ApiError::Status { .. } | ApiError::Network(_) => {
            ClipError::retryable(format!("status check for {job_id} failed: {e}"))
        }
        ApiError::Decode(_) | ApiError::Request(_) => {
            ClipError::non_retryable(format!("status of {job_id} could not be read: {e}"))
        }
    }
}
