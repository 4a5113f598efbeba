//! Page sources bound to a specific user and endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::aggregator::PageSource;
use super::governor::{PAGINATION_DELAY, REELS_DELAY};
use crate::upstream::{ScraperClient, UpstreamError};

/// Paginated content listings exposed by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Posts,
    Videos,
    Reels { include_feed_video: bool },
}

impl FeedKind {
    /// Governor delay between pages of this listing.
    #[must_use]
    pub const fn page_delay(self) -> Duration {
        match self {
            Self::Posts | Self::Videos => PAGINATION_DELAY,
            Self::Reels { .. } => REELS_DELAY,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Posts => "posts",
            Self::Videos => "videos",
            Self::Reels { .. } => "reels",
        }
    }
}

/// Pages of a user's post feed.
pub struct FeedSource {
    client: ScraperClient,
    user_id: String,
}

impl FeedSource {
    #[must_use]
    pub fn new(client: ScraperClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl PageSource for FeedSource {
    async fn fetch_page(&self, cursor: Option<String>) -> Result<Value, UpstreamError> {
        self.client.feed(&self.user_id, cursor.as_deref()).await
    }
}

/// Pages of a user's video posts.
pub struct VideoSource {
    client: ScraperClient,
    user_id: String,
}

impl VideoSource {
    #[must_use]
    pub fn new(client: ScraperClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl PageSource for VideoSource {
    async fn fetch_page(&self, cursor: Option<String>) -> Result<Value, UpstreamError> {
        self.client.all_videos(&self.user_id, cursor.as_deref()).await
    }
}

/// Pages of a user's reels.
pub struct ReelsSource {
    client: ScraperClient,
    user_id: String,
    include_feed_video: bool,
}

impl ReelsSource {
    #[must_use]
    pub fn new(
        client: ScraperClient,
        user_id: impl Into<String>,
        include_feed_video: bool,
    ) -> Self {
        Self {
            client,
            user_id: user_id.into(),
            include_feed_video,
        }
    }
}

#[async_trait]
impl PageSource for ReelsSource {
    async fn fetch_page(&self, cursor: Option<String>) -> Result<Value, UpstreamError> {
        self.client
            .reels(&self.user_id, self.include_feed_video, cursor.as_deref())
            .await
    }
}

/// Builds the page source for `kind`.
#[must_use]
pub fn source_for(kind: FeedKind, client: ScraperClient, user_id: &str) -> Box<dyn PageSource> {
    match kind {
        FeedKind::Posts => Box::new(FeedSource::new(client, user_id)),
        FeedKind::Videos => Box::new(VideoSource::new(client, user_id)),
        FeedKind::Reels { include_feed_video } => {
            Box::new(ReelsSource::new(client, user_id, include_feed_video))
        }
    }
}
