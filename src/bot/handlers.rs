use crate::bot::messaging::send_long_message;
use crate::bot::resilient::{
    edit_message_safe_resilient, send_media_resilient, send_message_resilient,
};
use crate::bot::views;
use crate::config::Settings;
use crate::feed::governor::IDENTITY_DELAY;
use crate::feed::{self, FeedKind, RateGovernor};
use crate::profiles::{
    extract_media_urls, post_shortcode, resolve_user_id, user_list, ResolveError, UserRef,
};
use crate::upstream::{ScraperClient, UpstreamError, UpstreamErrorKind};
use anyhow::Result;
use reqwest::Url;
use std::sync::Arc;
use teloxide::{prelude::*, types::ParseMode, utils::command::BotCommands};
use thiserror::Error;
use tracing::{info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "Start the bot.")]
    Start,
    #[command(description = "Show this help.")]
    Help,
    #[command(description = "Profile card: /userinfo <user>")]
    Userinfo(String),
    #[command(description = "Accounts a user follows: /following <user>")]
    Following(String),
    #[command(description = "Followers of a user: /followers <user>")]
    Followers(String),
    #[command(description = "Similar accounts: /similar <user>")]
    Similar(String),
    #[command(description = "Posts of a user: /postfeed <user> [max]")]
    Postfeed(String),
    #[command(description = "Videos of a user: /videofeed <user> [max]")]
    Videofeed(String),
    #[command(description = "Reels of a user: /reels <user> [include_feed_video]")]
    Reels(String),
    #[command(description = "Relay the media of a post: /download <url>")]
    Download(String),
}

/// Why a command produced no result.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Arguments were missing or malformed; carries the usage hint
    #[error("{0}")]
    Usage(&'static str),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl CommandError {
    /// Short text shown to the chat instead of the raw error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Usage(usage) => {
                format!("ℹ️ Usage: {}", html_escape::encode_text(usage))
            }
            Self::Resolve(ResolveError::UnknownUser(name)) => {
                format!("❌ User @{} not found.", html_escape::encode_text(name))
            }
            Self::Resolve(ResolveError::Upstream(err)) | Self::Upstream(err) => {
                upstream_message(err).to_string()
            }
        }
    }
}

const fn upstream_message(err: &UpstreamError) -> &'static str {
    match err.kind() {
        UpstreamErrorKind::NotFound => "❌ Not found. Check the username or link.",
        UpstreamErrorKind::AuthFailed => "❌ The data API rejected our credentials.",
        UpstreamErrorKind::BadRequest => "❌ The data API rejected the request.",
        UpstreamErrorKind::InvalidResponse => "❌ The data API returned an unreadable response.",
        UpstreamErrorKind::RateLimited => "⏳ The data API is rate limiting us. Try again later.",
        UpstreamErrorKind::TransportExhausted => {
            "❌ The data API is unreachable right now. Try again later."
        }
    }
}

const USER_USAGE: &str = "/<command> <username | @name | id | profile link>";
const POSTFEED_USAGE: &str = "/postfeed <user> [max items]";
const VIDEOFEED_USAGE: &str = "/videofeed <user> [max items]";
const REELS_USAGE: &str = "/reels <user> [include_feed_video: true|false]";
const DOWNLOAD_USAGE: &str = "/download <post, reel or tv link>";

/// Parses the single user argument of profile commands.
///
/// # Errors
///
/// Returns [`CommandError::Usage`] when the argument is not a user reference.
pub fn parse_user_arg(args: &str) -> Result<UserRef, CommandError> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(user), None) => UserRef::parse(user).ok_or(CommandError::Usage(USER_USAGE)),
        _ => Err(CommandError::Usage(USER_USAGE)),
    }
}

/// Parses `<user> [max]` for feed commands. A max of zero is rejected.
///
/// # Errors
///
/// Returns [`CommandError::Usage`] carrying `usage` on malformed arguments.
pub fn parse_feed_args(
    args: &str,
    usage: &'static str,
) -> Result<(UserRef, Option<usize>), CommandError> {
    let mut parts = args.split_whitespace();
    let user = parts
        .next()
        .and_then(UserRef::parse)
        .ok_or(CommandError::Usage(usage))?;
    let max_items = match parts.next() {
        None => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => Some(n),
            _ => return Err(CommandError::Usage(usage)),
        },
    };
    if parts.next().is_some() {
        return Err(CommandError::Usage(usage));
    }
    Ok((user, max_items))
}

/// Parses `<user> [include_feed_video]` for `/reels`. The flag defaults to `true`.
///
/// # Errors
///
/// Returns [`CommandError::Usage`] on malformed arguments.
pub fn parse_reels_args(args: &str) -> Result<(UserRef, bool), CommandError> {
    let mut parts = args.split_whitespace();
    let user = parts
        .next()
        .and_then(UserRef::parse)
        .ok_or(CommandError::Usage(REELS_USAGE))?;
    let include_feed_video = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("true" | "yes" | "1") => true,
        Some("false" | "no" | "0") => false,
        Some(_) => return Err(CommandError::Usage(REELS_USAGE)),
    };
    if parts.next().is_some() {
        return Err(CommandError::Usage(REELS_USAGE));
    }
    Ok((user, include_feed_video))
}

fn display_user(user: &UserRef) -> String {
    match user {
        UserRef::Id(id) => format!("user {id}"),
        UserRef::Username(name) => format!("@{name}"),
    }
}

fn identity_governor() -> RateGovernor {
    RateGovernor::new(IDENTITY_DELAY)
}

/// Sends either the rendered reply or the user-facing error text.
async fn reply(
    bot: &Bot,
    chat_id: ChatId,
    command: &str,
    result: Result<String, CommandError>,
) -> Result<()> {
    let text = match result {
        Ok(text) => text,
        Err(e) => {
            warn!(command, error = %e, "Command failed");
            e.user_message()
        }
    };
    send_long_message(bot, chat_id, &text).await
}

/// Reply sent when a handler fails outside its own error reporting.
pub const UNEXPECTED_ERROR_TEXT: &str = "❌ An unexpected error occurred. Please try again later.";

/// Best-effort notice to the chat after a handler failed; send errors are only logged.
pub async fn notify_failure(bot: &Bot, chat_id: ChatId) {
    if let Err(e) = send_message_resilient(bot, chat_id, UNEXPECTED_ERROR_TEXT, None).await {
        warn!(error = %e, "Failed to report handler error to chat");
    }
}

/// `/start` and `/help`
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    let text = views::help_text(&Command::descriptions().to_string());
    send_message_resilient(&bot, msg.chat.id, text, Some(ParseMode::Html)).await?;
    Ok(())
}

/// `/userinfo <user>`
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn userinfo(
    bot: Bot,
    msg: Message,
    args: String,
    client: Arc<ScraperClient>,
) -> Result<()> {
    let result = async {
        let user = parse_user_arg(&args)?;
        let user_id = resolve_user_id(&client, &user, &identity_governor()).await?;
        let raw = client.profile(&user_id).await?;
        Ok::<_, CommandError>(views::format_profile(&raw))
    }
    .await;
    reply(&bot, msg.chat.id, "userinfo", result).await
}

/// Which user list a relation command shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Following,
    Followers,
    Similar,
}

impl Relation {
    const fn title(self) -> &'static str {
        match self {
            Self::Following => "Following",
            Self::Followers => "Followers",
            Self::Similar => "Similar accounts",
        }
    }
}

/// `/following`, `/followers` and `/similar`
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn relation(
    bot: Bot,
    msg: Message,
    args: String,
    relation: Relation,
    client: Arc<ScraperClient>,
) -> Result<()> {
    let result = async {
        let user = parse_user_arg(&args)?;
        let user_id = resolve_user_id(&client, &user, &identity_governor()).await?;
        let raw = match relation {
            Relation::Following => client.following(&user_id).await?,
            Relation::Followers => client.followers(&user_id).await?,
            Relation::Similar => client.discover_chaining(&user_id).await?,
        };
        let title = format!("{} of {}", relation.title(), display_user(&user));
        Ok::<_, CommandError>(views::format_user_list(&title, &user_list(&raw)))
    }
    .await;
    reply(&bot, msg.chat.id, relation.title(), result).await
}

/// `/postfeed`, `/videofeed` and `/reels`
///
/// Posts a status message first since a run may take minutes, then the summary.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn feed_command(
    bot: Bot,
    msg: Message,
    args: String,
    command: Command,
    client: Arc<ScraperClient>,
    settings: Arc<Settings>,
) -> Result<()> {
    let parsed = match command {
        Command::Reels(_) => parse_reels_args(&args).map(|(user, include_feed_video)| {
            (user, FeedKind::Reels { include_feed_video }, None)
        }),
        Command::Videofeed(_) => parse_feed_args(&args, VIDEOFEED_USAGE)
            .map(|(user, max)| (user, FeedKind::Videos, max)),
        _ => parse_feed_args(&args, POSTFEED_USAGE)
            .map(|(user, max)| (user, FeedKind::Posts, max)),
    };
    let (user, kind, max_items) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return reply(&bot, msg.chat.id, "feed", Err(e)).await,
    };
    let max_items = max_items.or(settings.feed_default_max_items);
    let owner = display_user(&user);

    let status = send_message_resilient(
        &bot,
        msg.chat.id,
        format!(
            "⏳ Collecting {} of {}…",
            kind.label(),
            html_escape::encode_text(&owner)
        ),
        Some(ParseMode::Html),
    )
    .await?;

    info!(kind = kind.label(), user = %owner, ?max_items, "Starting feed collection");
    let result = async {
        let user_id = resolve_user_id(&client, &user, &identity_governor()).await?;
        let aggregated =
            feed::collect(&client, kind, &user_id, settings.feed_max_pages(), max_items).await?;
        Ok::<_, CommandError>(views::format_feed(kind, &owner, &aggregated))
    }
    .await;

    let status_text = if result.is_ok() {
        "✅ Done."
    } else {
        "⚠️ Stopped."
    };
    edit_message_safe_resilient(&bot, msg.chat.id, status.id, status_text).await;
    reply(&bot, msg.chat.id, kind.label(), result).await
}

/// `/download <url>`: relays every photo and video of a post by URL.
///
/// # Errors
///
/// Returns an error if a reply cannot be sent.
pub async fn download(
    bot: Bot,
    msg: Message,
    args: String,
    client: Arc<ScraperClient>,
) -> Result<()> {
    let link = args.trim();
    if post_shortcode(link).is_none() {
        return reply(
            &bot,
            msg.chat.id,
            "download",
            Err(CommandError::Usage(DOWNLOAD_USAGE)),
        )
        .await;
    }

    let media = match client.post(link).await {
        Ok(raw) => extract_media_urls(&raw),
        Err(e) => return reply(&bot, msg.chat.id, "download", Err(e.into())).await,
    };
    if media.is_empty() {
        return send_long_message(&bot, msg.chat.id, "❌ No media found in this post.").await;
    }

    let mut failed = 0usize;
    for item in &media {
        let Ok(url) = Url::parse(&item.url) else {
            warn!(url = %item.url, "Skipping unparsable media URL");
            failed += 1;
            continue;
        };
        if let Err(e) = send_media_resilient(&bot, msg.chat.id, item.kind, &url).await {
            warn!(error = %e, "Failed to relay media");
            failed += 1;
        }
    }
    info!(total = media.len(), failed, "Relayed post media");

    if failed > 0 {
        send_long_message(
            &bot,
            msg.chat.id,
            &format!("⚠️ {failed} of {} files could not be sent.", media.len()),
        )
        .await?;
    }
    Ok(())
}
