//! Outbound replies through the Telegram Bot API.

use super::resilient::send_message_resilient;
use async_trait::async_trait;
use clipbot_core::handler::ChatOutbound;
use teloxide::prelude::*;
use teloxide::types::ChatId;

/// Posts clip links back into Telegram chats.
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    /// Wrap a bot handle.
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatOutbound for TelegramOutbound {
    async fn send(&self, channel: i64, text: &str) -> anyhow::Result<()> {
        send_message_resilient(&self.bot, ChatId(channel), text).await?;
        Ok(())
    }
}
