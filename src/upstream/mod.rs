//! Upstream scraping API access
//!
//! Resilient fetching with classified retries and the typed endpoint client.

mod client;
mod error;
mod fetcher;
/// Retry classification and backoff schedule
pub mod retry;

pub use client::{ScraperClient, CURSOR_PARAM};
pub use error::{UpstreamError, UpstreamErrorKind};
pub use fetcher::{create_http_client, Fetcher};
pub use retry::{Failure, RetryDecision, RetryPolicy};
