//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! tunable constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::feed::DEFAULT_MAX_PAGES;
use crate::upstream::ScraperClient;

/// Default RapidAPI host of the scraping API.
pub const DEFAULT_RAPIDAPI_HOST: &str = "instagram-api-fast-reliable-data-scraper.p.rapidapi.com";

/// Application settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// RapidAPI key sent with every upstream call
    pub rapidapi_key: String,
    /// RapidAPI host header and default base URL host
    #[serde(default = "default_rapidapi_host")]
    pub rapidapi_host: String,
    /// Overrides `https://{rapidapi_host}` (mock servers, proxies)
    pub upstream_base_url: Option<String>,

    /// Page safety bound for feed commands
    #[serde(default = "default_feed_max_pages")]
    pub feed_max_pages: usize,
    /// Item budget for feed commands when the user gives none
    pub feed_default_max_items: Option<usize>,
}

fn default_rapidapi_host() -> String {
    DEFAULT_RAPIDAPI_HOST.to_string()
}

const fn default_feed_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

/// Builds the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        // `APP__FEED_MAX_PAGES=10` sets `feed_max_pages`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables; empty ones count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use feed_relay::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or a required key is missing.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Base URL of the upstream API.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.upstream_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("https://{}", self.rapidapi_host))
    }

    /// Builds the upstream client described by these settings.
    #[must_use]
    pub fn scraper_client(&self) -> ScraperClient {
        ScraperClient::with_base_url(
            &self.base_url(),
            &self.rapidapi_key,
            &self.rapidapi_host,
            Duration::from_secs(get_upstream_http_timeout_secs()),
            crate::upstream::RetryPolicy::default(),
        )
    }

    /// Page bound for feed commands, never below one.
    #[must_use]
    pub fn feed_max_pages(&self) -> usize {
        self.feed_max_pages.max(1)
    }
}

/// Per-call HTTP timeout for upstream requests (seconds).
pub const UPSTREAM_HTTP_TIMEOUT_SECS: u64 = 30;

/// Get upstream HTTP timeout from env or default.
///
/// Environment variable: `UPSTREAM_HTTP_TIMEOUT_SECS`.
#[must_use]
pub fn get_upstream_http_timeout_secs() -> u64 {
    std::env::var("UPSTREAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(UPSTREAM_HTTP_TIMEOUT_SECS)
}

// Telegram API retry configuration
/// Maximum retries for Telegram sends
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff for Telegram retries (ms)
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram retries (ms)
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Entries listed in one chat reply
pub const REPLY_LIST_LIMIT: usize = 20;
