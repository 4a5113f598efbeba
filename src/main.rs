use dotenvy::dotenv;
use feed_relay::bot::handlers::{self, Command, Relation};
use feed_relay::config::Settings;
use feed_relay::upstream::ScraperClient;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    rapidapi_header: Regex,
    rapidapi_env: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            rapidapi_header: Regex::new(r#"(?i)(x-rapidapi-key"?\s*[:=]\s*"?)[A-Za-z0-9_-]+"#)?,
            rapidapi_env: Regex::new(r"(?i)(rapidapi_key\s*[=:]\s*)[^\s&,]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .rapidapi_header
            .replace_all(&output, "${1}[MASKED]")
            .to_string();
        output = self
            .rapidapi_env
            .replace_all(&output, "${1}[MASKED]")
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

    // Redaction must be ready before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting feed relay bot...");

    let settings = init_settings();

    let client = Arc::new(settings.scraper_client());
    info!(
        base_url = %settings.base_url(),
        max_pages = settings.feed_max_pages(),
        "Upstream client initialized."
    );

    let bot = Bot::new(settings.telegram_token.clone());

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![client, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message().branch(
        dptree::entry()
            .filter_command::<Command>()
            .endpoint(handle_command),
    )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    client: Arc<ScraperClient>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let notifier = bot.clone();
    let res = match cmd.clone() {
        Command::Start | Command::Help => handlers::help(bot, msg).await,
        Command::Userinfo(args) => handlers::userinfo(bot, msg, args, client).await,
        Command::Following(args) => {
            handlers::relation(bot, msg, args, Relation::Following, client).await
        }
        Command::Followers(args) => {
            handlers::relation(bot, msg, args, Relation::Followers, client).await
        }
        Command::Similar(args) => {
            handlers::relation(bot, msg, args, Relation::Similar, client).await
        }
        Command::Postfeed(args) | Command::Videofeed(args) | Command::Reels(args) => {
            Box::pin(handlers::feed_command(
                bot, msg, args, cmd, client, settings,
            ))
            .await
        }
        Command::Download(args) => handlers::download(bot, msg, args, client).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
        handlers::notify_failure(&notifier, chat_id).await;
    }
    respond(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_telegram_token_in_url() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let line = "POST https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw/ sendMessage";
        let redacted = patterns.redact(line);
        assert!(!redacted.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw"));
        assert!(redacted.contains("[TELEGRAM_TOKEN]"));
        Ok(())
    }

    #[test]
    fn test_redacts_rapidapi_key() -> Result<(), regex::Error> {
        let patterns = RedactionPatterns::new()?;
        let header = patterns.redact(r#"headers: {"x-rapidapi-key": "abc123SECRET"}"#);
        assert!(!header.contains("abc123SECRET"));
        assert!(header.contains("[MASKED]"));

        let env = patterns.redact("RAPIDAPI_KEY=abc123SECRET other");
        assert_eq!(env, "RAPIDAPI_KEY=[MASKED] other");
        Ok(())
    }
}
