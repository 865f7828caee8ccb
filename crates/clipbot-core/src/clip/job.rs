//! State of a single conversion attempt.

use crate::config::CLIP_DURATION_SECS;
use crate::links::SourceLink;

/// Progress of a [`ClipJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Created, upload not yet accepted
    Pending,
    /// Upload accepted, remote id known
    Submitted,
    /// Remote reported `encoding`
    Encoding,
    /// Playable URL resolved
    Complete,
    /// Attempt ended in an error
    Failed,
}

/// One Upload→Poll→Fetch attempt. A retry starts from a fresh job.
#[derive(Debug, Clone)]
pub struct ClipJob {
    /// Link being converted
    pub source: SourceLink,
    /// Always [`CLIP_DURATION_SECS`]
    pub duration_secs: u32,
    /// Remote job id, once submitted
    pub remote_job_id: Option<String>,
    /// Current state
    pub status: JobStatus,
    /// Playable URL on success
    pub result_url: Option<String>,
}

impl ClipJob {
    /// Start a job for `source`.
    #[must_use]
    pub fn new(source: SourceLink) -> Self {
        Self {
            source,
            duration_secs: CLIP_DURATION_SECS,
            remote_job_id: None,
            status: JobStatus::Pending,
            result_url: None,
        }
    }

    /// Record the id returned by the upload endpoint.
    pub fn submitted(&mut self, remote_job_id: String) {
        self.remote_job_id = Some(remote_job_id);
        self.status = JobStatus::Submitted;
    }

    /// Mark the job as waiting on the encoder.
    pub fn encoding(&mut self) {
        self.status = JobStatus::Encoding;
    }

    /// Record the resolved URL.
    pub fn completed(&mut self, url: String) {
        self.result_url = Some(url);
        self.status = JobStatus::Complete;
    }

    /// Mark the attempt as failed.
    pub fn failed(&mut self) {
        self.status = JobStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path_transitions() {
        let mut job = ClipJob::new(SourceLink::new("https://youtu.be/abc123", 0));
        assert_eq!(job.duration_secs, 15);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.remote_job_id, None);

        job.submitted("xyz".to_string());
        assert_eq!(job.status, JobStatus::Submitted);
        assert_eq!(job.remote_job_id.as_deref(), Some("xyz"));

        job.encoding();
        assert_eq!(job.status, JobStatus::Encoding);

        job.completed("https://cdn/xyz.webm".to_string());
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.result_url.as_deref(), Some("https://cdn/xyz.webm"));
    }

    #[test]
    fn failure_before_upload_is_recorded() {
        let mut job = ClipJob::new(SourceLink::new("https://youtu.be/abc123", 0));
        job.failed();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.remote_job_id, None);
    }
}
