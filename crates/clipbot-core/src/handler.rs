//! Inbound message handling.
//!
//! The chat platform is reached only through [`ChatOutbound`] and a
//! [`CancellationToken`] that the transport watches to stop accepting
//! events. Links inside one message are converted one at a time, in the
//! order they appear.

use crate::clip::RetryController;
use crate::error::{ClipResult, ErrorKind};
use crate::links::{SourceLink, SupportedSites};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Word that, together with a mention of the bot, shuts the service down.
const CLOSE_COMMAND: &str = "close";

/// Text message delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Conversation the message was posted in
    pub channel: i64,
    /// Raw message text
    pub text: String,
}

/// Outbound side of the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    /// Post `text` into `channel`.
    async fn send(&self, channel: i64, text: &str) -> anyhow::Result<()>;
}

/// Anything that turns a supported link into a hosted clip URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkConverter: Send + Sync {
    /// Convert `link`. Never returns `Retryable`.
    async fn convert(&self, link: &SourceLink) -> ClipResult<String>;
}

#[async_trait]
impl LinkConverter for RetryController {
    async fn convert(&self, link: &SourceLink) -> ClipResult<String> {
        RetryController::convert(self, link).await
    }
}

/// Routes inbound messages through the clip pipeline
pub struct MessageHandler {
    sites: SupportedSites,
    converter: Arc<dyn LinkConverter>,
    outbound: Arc<dyn ChatOutbound>,
    shutdown: CancellationToken,
    mention: RwLock<Option<String>>,
}

impl MessageHandler {
    /// Create a handler. `shutdown` fires on a critical error or a close command.
    #[must_use]
    pub fn new(
        sites: SupportedSites,
        converter: Arc<dyn LinkConverter>,
        outbound: Arc<dyn ChatOutbound>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sites,
            converter,
            outbound,
            shutdown,
            mention: RwLock::new(None),
        }
    }

    /// Token the transport watches to stop accepting events.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Record the bot identity once the platform session is up.
    pub fn on_ready(&self, username: &str) {
        info!("Logged in as {username}.");
        if let Ok(mut mention) = self.mention.write() {
            *mention = Some(format!("@{}", username.to_lowercase()));
        }
    }

    /// Process one inbound message.
    pub async fn handle_message(&self, message: &InboundMessage) {
        if self.shutdown.is_cancelled() {
            warn!(channel = message.channel, "Shutting down, ignoring message");
            return;
        }

        for link in self.sites.extract_links(&message.text) {
            match self.converter.convert(&link).await {
                Ok(url) => {
                    if let Err(e) = self.outbound.send(message.channel, &url).await {
                        error!(channel = message.channel, "Failed to send clip link: {e}");
                    }
                }
                Err(e) if e.kind() == ErrorKind::Critical => {
                    error!("Critical error, shutting down service: {e}");
                    self.shutdown.cancel();
                    return;
                }
                Err(e) => {
                    error!(link = %link.url, "Could not process link: {e}");
                }
            }
        }

        if self.is_close_command(&message.text) {
            info!(channel = message.channel, "Close command received, shutting down");
            self.shutdown.cancel();
        }
    }

    fn is_close_command(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        if !lowered.contains(CLOSE_COMMAND) {
            return false;
        }
        self.mention
            .read()
            .ok()
            .and_then(|mention| mention.as_ref().map(|m| lowered.contains(m.as_str())))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClipError;
    use mockall::predicate::eq;

    fn handler(converter: MockLinkConverter, outbound: MockChatOutbound) -> MessageHandler {
        MessageHandler::new(
            SupportedSites::default(),
            Arc::new(converter),
            Arc::new(outbound),
            CancellationToken::new(),
        )
    }

    fn message(text: &str) -> InboundMessage {
        InboundMessage {
            channel: 7,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn replies_per_link_in_order() {
        let mut converter = MockLinkConverter::new();
        converter
            .expect_convert()
            .returning(|link| Ok(format!("{}.webm", link.url)));

        let mut outbound = MockChatOutbound::new();
        let mut seq = mockall::Sequence::new();
        outbound
            .expect_send()
            .with(eq(7), eq("https://youtu.be/a.webm"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        outbound
            .expect_send()
            .with(eq(7), eq("https://youtu.be/b.webm"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        handler(converter, outbound)
            .handle_message(&message("https://youtu.be/a then https://youtu.be/b"))
            .await;
    }

    #[tokio::test]
    async fn non_retryable_skips_only_that_link() {
        let mut converter = MockLinkConverter::new();
        converter.expect_convert().returning(|link| {
            if link.url.ends_with("/bad") {
                Err(ClipError::non_retryable("too large"))
            } else {
                Ok("https://cdn/good.webm".to_string())
            }
        });

        let mut outbound = MockChatOutbound::new();
        outbound
            .expect_send()
            .with(eq(7), eq("https://cdn/good.webm"))
            .times(1)
            .returning(|_, _| Ok(()));

        let handler = handler(converter, outbound);
        handler
            .handle_message(&message("https://youtu.be/bad https://youtu.be/good"))
            .await;
        assert!(!handler.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn critical_stops_message_and_service() {
        let mut converter = MockLinkConverter::new();
        converter
            .expect_convert()
            .times(1)
            .returning(|_| Err(ClipError::critical("token issuance broken")));

        let mut outbound = MockChatOutbound::new();
        outbound.expect_send().never();

        let handler = handler(converter, outbound);
        handler
            .handle_message(&message("https://youtu.be/a https://youtu.be/b"))
            .await;
        assert!(handler.shutdown_token().is_cancelled());

        // No further work once shut down.
        handler.handle_message(&message("https://youtu.be/c")).await;
    }

    #[tokio::test]
    async fn close_requires_mention() {
        let converter = MockLinkConverter::new();
        let outbound = MockChatOutbound::new();
        let handler = handler(converter, outbound);
        handler.on_ready("ClipBot");

        handler.handle_message(&message("please close the door")).await;
        assert!(!handler.shutdown_token().is_cancelled());

        handler.handle_message(&message("@clipbot CLOSE")).await;
        assert!(handler.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn send_failure_does_not_stop_remaining_links() {
        let mut converter = MockLinkConverter::new();
        converter
            .expect_convert()
            .times(2)
            .returning(|link| Ok(format!("{}.webm", link.url)));

        let mut outbound = MockChatOutbound::new();
        outbound
            .expect_send()
            .times(2)
            .returning(|_, _| Err(anyhow::anyhow!("chat unavailable")));

        handler(converter, outbound)
            .handle_message(&message("https://youtu.be/a https://youtu.be/b"))
            .await;
    }
}
