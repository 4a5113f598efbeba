//! Single logical GET against the upstream JSON API, with classified retries.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::error::UpstreamError;
use super::retry::{Failure, RetryDecision, RetryPolicy};

/// Creates an HTTP client with a per-call timeout.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Issues GET requests against one upstream base URL.
///
/// Owns the retry loop: transient failures are retried according to its
/// [`RetryPolicy`], permanent ones are returned after the first attempt.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    base_url: String,
    headers: Vec<(String, String)>,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher for `base_url`, sending `headers` with every request.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        headers: Vec<(String, String)>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client: create_http_client(timeout),
            base_url: base_url.into(),
            headers,
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Joins the base URL and a relative endpoint.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Fetches `endpoint` with the given query parameters and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the classified [`UpstreamError`] once the request is known to be
    /// unrecoverable: immediately for 400/401/403/404 and non-JSON bodies, after
    /// the attempt budget for 429, timeouts, connection and other HTTP errors.
    #[instrument(skip(self, params))]
    pub async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint_url(endpoint);
        let mut attempt: u32 = 0;

        loop {
            let failure = match self.attempt(&url, params).await {
                Ok(value) => {
                    debug!(attempt, "Upstream request succeeded");
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            match self.policy.decide(endpoint, attempt, failure.clone()) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Fail(err) => {
                    error!(attempt, error = %err, "Upstream request failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, url: &str, params: &[(&str, String)]) -> Result<Value, Failure> {
        let mut request = self.client.get(url).query(params);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Failure::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Failure::Status {
                code: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Failure::from_reqwest(&e))?;
        serde_json::from_str(&body).map_err(|e| Failure::Decode(e.to_string()))
    }
}
