//! Cursor-driven pagination with cross-page deduplication.
//!
//! One aggregation run walks `fetch → normalize → dedupe → next cursor`
//! until the upstream stops producing new content, the caller's item budget
//! is filled, the cursor runs out, or the page safety bound is hit.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::fingerprint::{Fingerprint, SeenSet};
use super::governor::RateGovernor;
use super::normalize::{extract_items, scalar_string, Item};
use crate::upstream::UpstreamError;

/// Upper bound on pages fetched in one run.
pub const DEFAULT_MAX_PAGES: usize = 50;

const CURSOR_KEYS: &[&str] = &[
    "next_max_id",
    "next_cursor",
    "end_cursor",
    "max_id",
    "cursor",
];
const PAGINATION_OBJECTS: &[&str] = &["paging_info", "page_info", "pagination"];

/// Fetches one raw page for a given cursor (`None` for the first page).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, cursor: Option<String>) -> Result<Value, UpstreamError>;
}

/// Why an aggregation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page contained nothing that had not been seen already
    NoNewItems,
    /// The item budget was reached
    ItemLimit,
    /// The upstream returned no next cursor
    EndOfStream,
    /// The page safety bound was reached
    PageLimit,
}

/// Result of one aggregation run.
#[derive(Debug, Clone)]
pub struct Aggregated {
    /// Deduplicated items in first-seen order
    pub items: Vec<Item>,
    /// Most recently observed cursor; may not be resumable
    pub last_cursor: Option<String>,
    pub pages_fetched: usize,
    pub stop_reason: StopReason,
}

/// Drives paginated retrieval for a single [`PageSource`].
///
/// Holds no per-run state; the seen set lives inside [`Aggregator::aggregate`]
/// so concurrent runs never share anything.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    governor: RateGovernor,
    max_pages: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new(governor: RateGovernor, max_pages: usize) -> Self {
        Self {
            governor,
            max_pages: max_pages.max(1),
        }
    }

    #[must_use]
    pub const fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Runs pagination starting from `initial_cursor`.
    ///
    /// # Errors
    ///
    /// Any [`UpstreamError`] from the source aborts the run; items collected
    /// from earlier pages are discarded.
    #[instrument(skip(self, source))]
    pub async fn aggregate<S>(
        &self,
        source: &S,
        initial_cursor: Option<String>,
        max_items: Option<usize>,
    ) -> Result<Aggregated, UpstreamError>
    where
        S: PageSource + ?Sized,
    {
        let mut seen = SeenSet::new();
        let mut items: Vec<Item> = Vec::new();
        let mut cursor = initial_cursor;
        let mut last_cursor = cursor.clone();
        let mut pages_fetched = 0usize;

        loop {
            if pages_fetched > 0 {
                self.governor.wait_before_next_call().await;
            }

            let raw = source.fetch_page(cursor.clone()).await?;
            pages_fetched += 1;

            let before = items.len();
            for item in extract_items(&raw) {
                if seen.admit(&Fingerprint::of(&item)) {
                    items.push(item);
                }
            }
            let added = items.len() - before;

            let next = next_cursor(&raw);
            if next.is_some() {
                last_cursor.clone_from(&next);
            }

            debug!(
                page = pages_fetched,
                added,
                total = items.len(),
                has_next = next.is_some(),
                "Merged page"
            );

            let stop = if added == 0 {
                Some(StopReason::NoNewItems)
            } else if let Some(limit) = max_items.filter(|limit| items.len() >= *limit) {
                items.truncate(limit);
                Some(StopReason::ItemLimit)
            } else if next.is_none() {
                Some(StopReason::EndOfStream)
            } else if pages_fetched >= self.max_pages {
                Some(StopReason::PageLimit)
            } else {
                None
            };

            if let Some(stop_reason) = stop {
                info!(
                    pages = pages_fetched,
                    items = items.len(),
                    reason = ?stop_reason,
                    "Aggregation finished"
                );
                return Ok(Aggregated {
                    items,
                    last_cursor,
                    pages_fetched,
                    stop_reason,
                });
            }

            cursor = next;
        }
    }
}

/// Finds the next-page cursor in a raw response.
///
/// Looks at the top level, then at pagination info objects, then inside
/// `data` (its fields, then its pagination info objects).
#[must_use]
pub fn next_cursor(raw: &Value) -> Option<String> {
    cursor_in(raw).or_else(|| raw.get("data").and_then(cursor_in))
}

fn cursor_in(value: &Value) -> Option<String> {
    cursor_field(value).or_else(|| {
        PAGINATION_OBJECTS
            .iter()
            .find_map(|key| value.get(*key).and_then(cursor_field))
    })
}

fn cursor_field(value: &Value) -> Option<String> {
    CURSOR_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(scalar_string))
}
