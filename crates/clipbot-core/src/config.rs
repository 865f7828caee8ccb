//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the pipeline policy constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default base URL of the clip-hosting API.
pub const DEFAULT_CLIP_API_BASE: &str = "https://api.gfycat.com/v1";
/// Default timeout for a single HTTP call to the clip-hosting API.
pub const DEFAULT_CLIP_HTTP_TIMEOUT_SECS: u64 = 30;

/// Length of every generated clip.
pub const CLIP_DURATION_SECS: u32 = 15;
/// Delay between two status checks.
pub const POLL_INTERVAL_SECS: u64 = 30;
/// Ceiling on the time spent waiting for the remote encoder.
pub const POLL_MAX_WAIT_SECS: u64 = 600;
/// Upload/poll/fetch attempts per link.
pub const CONVERT_MAX_ATTEMPTS: usize = 3;
/// Credential issuance attempts before the service gives up.
pub const TOKEN_ISSUE_MAX_ATTEMPTS: usize = 3;
/// Subtracted from the server-reported token lifetime.
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 5;

/// Build the layered configuration shared by every settings struct.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // UPPER_SNAKE_CASE is mapped to snake_case; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Clip-hosting service settings
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ClipSettings {
    /// OAuth client id for the clip-hosting service
    pub clip_client_id: String,
    /// OAuth client secret for the clip-hosting service
    pub clip_client_secret: String,
    /// Override for the API base URL
    pub clip_api_base: Option<String>,
    /// Per-request HTTP timeout in seconds
    pub clip_http_timeout_secs: Option<u64>,
    /// Path to a JSON file replacing the built-in supported-site table
    pub supported_sites_path: Option<String>,
}

impl ClipSettings {
    /// Load settings from the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        if settings.clip_client_id.is_empty() || settings.clip_client_secret.is_empty() {
            return Err(ConfigError::Message(
                "clip_client_id and clip_client_secret must be set".to_string(),
            ));
        }
        Ok(settings)
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> String {
        self.clip_api_base
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CLIP_API_BASE)
            .trim_end_matches('/')
            .to_string()
    }

    /// Timeout applied to every clip-hosting request, token issuance included.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(
            self.clip_http_timeout_secs
                .unwrap_or(DEFAULT_CLIP_HTTP_TIMEOUT_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_defaults_and_trims() {
        let mut settings = ClipSettings::default();
        assert_eq!(settings.api_base(), DEFAULT_CLIP_API_BASE);

        settings.clip_api_base = Some(String::new());
        assert_eq!(settings.api_base(), DEFAULT_CLIP_API_BASE);

        settings.clip_api_base = Some("http://127.0.0.1:9000/v1/".to_string());
        assert_eq!(settings.api_base(), "http://127.0.0.1:9000/v1");
    }

    #[test]
    fn http_timeout_default() {
        let settings = ClipSettings::default();
        assert_eq!(settings.http_timeout(), Duration::from_secs(30));

        let settings = ClipSettings {
            clip_http_timeout_secs: Some(5),
            ..ClipSettings::default()
        };
        assert_eq!(settings.http_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn poll_budget_is_twenty_checks() {
        assert_eq!(POLL_MAX_WAIT_SECS / POLL_INTERVAL_SECS, 20);
    }
}
