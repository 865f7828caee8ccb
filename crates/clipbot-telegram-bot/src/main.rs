use clipbot_core::config::ClipSettings;
use clipbot_transport_telegram::config::{BotSettings, TelegramSettings};
use clipbot_transport_telegram::runner::run_bot;
use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    bot_url_token: Regex,
    bare_token: Regex,
    bot_prefixed_token: Regex,
    client_secret_env: Regex,
    client_secret_json: Regex,
    bearer: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bot_url_token: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            bare_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            bot_prefixed_token: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            client_secret_env: Regex::new(r"CLIP_CLIENT_SECRET=[^\s&]+")?,
            client_secret_json: Regex::new(r#""client_secret"\s*:\s*"[^"]*""#)?,
            bearer: Regex::new(r"(Bearer\s+)[A-Za-z0-9._~+/=-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .bot_url_token
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .bare_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .bot_prefixed_token
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .client_secret_env
            .replace_all(&output, "CLIP_CLIENT_SECRET=[MASKED]")
            .to_string();
        output = self
            .client_secret_json
            .replace_all(&output, r#""client_secret":"[MASKED]""#)
            .to_string();
        output = self
            .bearer
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted text may differ in size.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Patterns must exist before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting Clipbot TG Bot...");

    let settings = init_settings();

    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = std::env::var("DEBUG_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let filter = if debug_mode {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "clipbot_core=info,clipbot_transport_telegram=info,clipbot_telegram_bot=info,teloxide=warn,hyper=warn,h2=error,reqwest=warn,tokio=warn",
            )
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<BotSettings> {
    let clip_settings = match ClipSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load clip host configuration: {}", e);
            std::process::exit(1);
        }
    };
    let telegram_settings = match TelegramSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load telegram configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully.");
    Arc::new(BotSettings::new(clip_settings, telegram_settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_secrets() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;

        let line = "POST https://api.telegram.org/bot123456789:AAbbCCddEEffGGhhIIjjKKllMMnnOOppQQr/sendMessage";
        assert!(!patterns.redact(line).contains("AAbbCC"));

        let line = r#"body {"grant_type":"client_credentials","client_id":"id","client_secret":"hunter2"}"#;
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains(r#""client_id":"id""#));

        let redacted = patterns.redact("Authorization: Bearer abc.DEF-123");
        assert_eq!(redacted, "Authorization: Bearer [MASKED]");

        let redacted = patterns.redact("CLIP_CLIENT_SECRET=s3cr3t other");
        assert_eq!(redacted, "CLIP_CLIENT_SECRET=[MASKED] other");
        Ok(())
    }
}
