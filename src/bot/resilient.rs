//! Telegram API calls wrapped in [`crate::utils::retry_telegram_operation`].

use anyhow::Result;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, Message, MessageId, ParseMode};
use tracing::{debug, warn};

use crate::profiles::MediaKind;

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Replaces a status message's text. Failures are logged, not returned.
///
/// Returns `true` if the message was edited.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> bool {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    let result = crate::utils::retry_telegram_operation(|| async {
        bot.edit_message_text(chat_id, msg_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) || err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Status update skipped: {err_msg}");
            } else {
                warn!("Failed to edit status message after retries: {e}");
            }
            false
        }
    }
}

/// Relays a remote photo or video by URL. Telegram fetches the file itself.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_media_resilient(
    bot: &Bot,
    chat_id: ChatId,
    kind: MediaKind,
    url: &Url,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        let file = InputFile::url(url.clone());
        let sent = match kind {
            MediaKind::Photo => bot.send_photo(chat_id, file).await,
            MediaKind::Video => bot.send_video(chat_id, file).await,
        };
        sent.map_err(|e| anyhow::anyhow!("Telegram media send error: {e}"))
    })
    .await
}
