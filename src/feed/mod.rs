//! Paginated feed aggregation
//!
//! Normalizes loosely shaped upstream pages into items, deduplicates them by
//! heuristic fingerprints and walks cursors under page/item bounds.

/// Cursor-driven pagination
pub mod aggregator;
/// Deduplication keys
pub mod fingerprint;
/// Inter-request throttling
pub mod governor;
/// Item extraction from raw responses
pub mod normalize;
/// Endpoint-bound page sources
pub mod sources;

pub use aggregator::{
    next_cursor, Aggregated, Aggregator, PageSource, StopReason, DEFAULT_MAX_PAGES,
};
pub use fingerprint::{Fingerprint, FingerprintKey, SeenSet};
pub use governor::RateGovernor;
pub use normalize::{extract_items, extract_items_with, Item, ShapeStrategy, SHAPE_ORDER};
pub use sources::{source_for, FeedKind, FeedSource, ReelsSource, VideoSource};

use crate::upstream::{ScraperClient, UpstreamError};

/// Aggregates one listing of `user_id` with the delay appropriate for `kind`.
///
/// # Errors
///
/// Propagates the first [`UpstreamError`] raised during pagination.
pub async fn collect(
    client: &ScraperClient,
    kind: FeedKind,
    user_id: &str,
    max_pages: usize,
    max_items: Option<usize>,
) -> Result<Aggregated, UpstreamError> {
    let source = source_for(kind, client.clone(), user_id);
    let aggregator = Aggregator::new(RateGovernor::new(kind.page_delay()), max_pages);
    aggregator.aggregate(source.as_ref(), None, max_items).await
}
