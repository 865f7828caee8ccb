//! Telegram transport settings.

use clipbot_core::config::ClipSettings;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        clipbot_core::config::build_config()?.try_deserialize()
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Clip-hosting settings shared with the pipeline.
    pub clip: Arc<ClipSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(clip: ClipSettings, telegram: TelegramSettings) -> Self {
        Self {
            clip: Arc::new(clip),
            telegram: Arc::new(telegram),
        }
    }
}

/// Initial delay before retrying a failed Telegram API call.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound on the delay between Telegram API retries.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 5_000;
/// Retries after the first failed Telegram API call.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
