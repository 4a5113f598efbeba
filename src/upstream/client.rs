//! Typed wrappers over the scraping API endpoints.

use std::time::Duration;

use serde_json::Value;

use super::error::UpstreamError;
use super::fetcher::Fetcher;
use super::retry::RetryPolicy;

/// Query parameter carrying the pagination cursor.
pub const CURSOR_PARAM: &str = "next_max_id";

/// Client for the RapidAPI-hosted scraping API.
///
/// Each method is one logical request; retries happen inside [`Fetcher`].
#[derive(Clone)]
pub struct ScraperClient {
    fetcher: Fetcher,
}

impl ScraperClient {
    /// Creates a client for `https://{host}` authenticated with `api_key`.
    #[must_use]
    pub fn new(api_key: &str, host: &str, timeout: Duration) -> Self {
        Self::with_base_url(
            &format!("https://{host}"),
            api_key,
            host,
            timeout,
            RetryPolicy::default(),
        )
    }

    /// Creates a client against an explicit base URL.
    #[must_use]
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        host: &str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        let headers = vec![
            ("x-rapidapi-key".to_string(), api_key.to_string()),
            ("x-rapidapi-host".to_string(), host.to_string()),
        ];
        Self {
            fetcher: Fetcher::new(base_url, headers, timeout, policy),
        }
    }

    #[must_use]
    pub const fn from_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    #[must_use]
    pub const fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// One page of a user's post feed.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn feed(&self, user_id: &str, cursor: Option<&str>) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("feed", &paged_params(user_id, cursor))
            .await
    }

    /// One page of a user's video posts.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn all_videos(
        &self,
        user_id: &str,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("all_video", &paged_params(user_id, cursor))
            .await
    }

    /// One page of a user's reels.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn reels(
        &self,
        user_id: &str,
        include_feed_video: bool,
        cursor: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let mut params = paged_params(user_id, cursor);
        params.push(("include_feed_video", include_feed_video.to_string()));
        self.fetcher.fetch("reels", &params).await
    }

    /// Accounts the user follows.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn following(&self, user_id: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("following", &[("user_id", user_id.to_string())])
            .await
    }

    /// Accounts following the user.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn followers(&self, user_id: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("followers", &[("user_id", user_id.to_string())])
            .await
    }

    /// Resolves a username to its numeric id.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn user_id_by_username(&self, username: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("user_id_by_username", &[("username", username.to_string())])
            .await
    }

    /// Resolves a numeric id to its username.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn username_by_id(&self, user_id: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("username_by_id", &[("user_id", user_id.to_string())])
            .await
    }

    /// Profile information for a user.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn profile(&self, user_id: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("profile", &[("user_id", user_id.to_string())])
            .await
    }

    /// Post or reel details for a public URL.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn post(&self, post_url: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("post", &[("url", post_url.to_string())])
            .await
    }

    /// Similar account recommendations.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's [`UpstreamError`].
    pub async fn discover_chaining(&self, user_id: &str) -> Result<Value, UpstreamError> {
        self.fetcher
            .fetch("discover_chaining", &[("user_id", user_id.to_string())])
            .await
    }
}

fn paged_params(user_id: &str, cursor: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("user_id", user_id.to_string())];
    if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
        params.push((CURSOR_PARAM, cursor.to_string()));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_params_omit_missing_cursor() {
        assert_eq!(paged_params("42", None), vec![("user_id", "42".to_string())]);
        assert_eq!(paged_params("42", Some("")).len(), 1);
        assert_eq!(
            paged_params("42", Some("QVFE")),
            vec![
                ("user_id", "42".to_string()),
                (CURSOR_PARAM, "QVFE".to_string())
            ]
        );
    }
}
