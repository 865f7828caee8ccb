/// `ChatOutbound` implementation backed by the Bot API
pub mod outbound;
/// Bot API calls with retry on transient failures
pub mod resilient;

pub use outbound::TelegramOutbound;
