//! Text helpers for chat replies and a retry wrapper for Telegram calls.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Splits a reply into parts no longer than `max_length` bytes.
///
/// Parts break on line boundaries where possible. A single line longer than
/// `max_length` is cut on grapheme clusters so multi-byte text stays intact.
///
/// # Examples
///
/// ```
/// use feed_relay::utils::split_long_message;
/// let long_msg = "@someone\n".repeat(1000);
/// let parts = split_long_message(&long_msg, 4000);
/// assert!(parts.len() > 1);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        if line.len() > max_length {
            flush(&mut parts, &mut current);
            let mut chunk = String::new();
            for grapheme in line.graphemes(true) {
                if chunk.len() + grapheme.len() > max_length {
                    parts.push(std::mem::take(&mut chunk));
                }
                chunk.push_str(grapheme);
            }
            current = chunk;
            current.push('\n');
            continue;
        }

        if current.len() + line.len() + 1 > max_length {
            flush(&mut parts, &mut current);
        }
        current.push_str(line);
        current.push('\n');
    }
    flush(&mut parts, &mut current);

    parts
}

fn flush(parts: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim_end();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    current.clear();
}

/// Truncates a string to at most `max_chars` characters (not bytes).
///
/// # Examples
///
/// ```
/// use feed_relay::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Truncates to `max_chars` and appends an ellipsis when something was cut.
#[must_use]
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    let truncated = truncate_str(s, max_chars);
    if truncated.len() < s.len() {
        format!("{}…", truncated.trim_end())
    } else {
        truncated
    }
}

/// Retries a Telegram API call with jittered exponential backoff.
///
/// Upstream scraping calls never go through here; they have their own
/// status-aware policy in [`crate::upstream::RetryPolicy`].
///
/// # Errors
///
/// Returns the last error once all attempts are used.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
