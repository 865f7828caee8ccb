#![deny(missing_docs)]
//! Clipbot core library.
//!
//! Clip-hosting client, credential lifecycle, the upload/poll/fetch
//! pipeline with its retry policy, link recognition and message handling.

/// Clip conversion pipeline.
pub mod clip;
/// Configuration management.
pub mod config;
/// Error taxonomy shared by the pipeline.
pub mod error;
/// Chat boundary and inbound message handling.
pub mod handler;
/// Supported-link recognition.
pub mod links;

pub use error::{ClipError, ErrorKind};
