//! Clip conversion pipeline
//!
//! `RetryController` drives `ClipUploader` → `StatusPoller` → `ClipResolver`,
//! all of which share one `TokenManager`.

/// Remote API seam and its HTTP client.
pub mod api;
/// Per-attempt job state.
pub mod job;
/// Encoder status polling.
pub mod poller;
/// Final URL lookup.
pub mod resolver;
/// Attempt-level retry policy.
pub mod retry;
/// Shared access credential.
pub mod token;
/// Job submission.
pub mod uploader;

pub use api::{ApiError, ClipHostApi, GfycatClient};
pub use poller::{PollPolicy, StatusPoller};
pub use resolver::ClipResolver;
pub use retry::RetryController;
pub use token::{ClientCredentials, Credential, TokenManager};
pub use uploader::ClipUploader;
