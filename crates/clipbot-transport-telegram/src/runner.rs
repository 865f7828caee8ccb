use crate::bot::TelegramOutbound;
use crate::config::BotSettings;
use clipbot_core::clip::RetryController;
use clipbot_core::handler::{InboundMessage, MessageHandler};
use clipbot_core::links::SupportedSites;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
///
/// Returns once the dispatcher stops, either on Ctrl-C or when the message
/// handler fires its shutdown token.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let sites = init_supported_sites(&settings);

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let shutdown = CancellationToken::new();

    let converter = Arc::new(RetryController::from_settings(settings.clip.as_ref()));
    info!("Clip pipeline initialized.");

    let outbound = Arc::new(TelegramOutbound::new(bot.clone()));
    let handler = Arc::new(MessageHandler::new(
        sites,
        converter,
        outbound,
        shutdown.clone(),
    ));

    match bot.get_me().await {
        Ok(me) => handler.on_ready(me.username()),
        Err(e) => warn!("Could not fetch bot identity, close command disabled: {}", e),
    }

    let mut dispatcher = Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![handler])
        .enable_ctrlc_handler()
        .build();

    let dispatcher_shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        info!("Shutdown requested, no longer accepting messages.");
        match dispatcher_shutdown.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => warn!("Dispatcher was not running at shutdown: {:?}", e),
        }
    });

    info!("Bot is running...");
    dispatcher.dispatch().await;
    info!("Bot stopped.");
}

fn init_supported_sites(settings: &BotSettings) -> SupportedSites {
    match SupportedSites::from_settings(settings.clip.as_ref()) {
        Ok(sites) => {
            info!("Supported sites: {} rules.", sites.sites.len());
            sites
        }
        Err(e) => {
            error!("Failed to load supported sites: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(handle_text)
}

async fn handle_text(
    msg: Message,
    handler: Arc<MessageHandler>,
) -> Result<(), teloxide::RequestError> {
    let Some(text) = msg.text() else {
        return respond(());
    };
    let inbound = InboundMessage {
        channel: msg.chat.id.0,
        text: text.to_string(),
    };

    // A conversion can poll for minutes; keep the dispatcher free.
    tokio::spawn(async move {
        handler.handle_message(&inbound).await;
    });

    respond(())
}
