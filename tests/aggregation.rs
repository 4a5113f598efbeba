use async_trait::async_trait;
use feed_relay::feed::governor::PAGINATION_DELAY;
use feed_relay::feed::{
    extract_items, Aggregated, Aggregator, Fingerprint, PageSource, RateGovernor, SeenSet,
    StopReason,
};
use feed_relay::upstream::UpstreamError;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serves prepared pages in order; past the end it serves empty pages.
struct ScriptedSource {
    pages: Vec<Value>,
    calls: AtomicUsize,
    cursors: Mutex<Vec<Option<String>>>,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    fn new(pages: Vec<Value>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
            cursors: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, cursor: Option<String>) -> Result<Value, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().await.push(cursor);
        self.call_times.lock().await.push(Instant::now());
        Ok(self
            .pages
            .get(n)
            .cloned()
            .unwrap_or_else(|| json!({"items": []})))
    }
}

fn post(id: u32, caption: &str) -> Value {
    json!({"id": id.to_string(), "caption": caption})
}

fn page(items: Vec<Value>, cursor: Option<&str>) -> Value {
    match cursor {
        Some(c) => json!({"items": items, "next_max_id": c}),
        None => json!({"items": items}),
    }
}

async fn run(source: &ScriptedSource, max_pages: usize, max_items: Option<usize>) -> Aggregated {
    let result = Aggregator::new(RateGovernor::disabled(), max_pages)
        .aggregate(source, None, max_items)
        .await;
    let Ok(result) = result else {
        panic!("aggregation failed");
    };
    result
}

#[tokio::test]
async fn repeated_page_stops_on_duplicates() {
    // Same captions, fresh ids: the text key alone marks them as seen
    let source = ScriptedSource::new(vec![
        page(
            vec![post(1, "alpha"), post(2, "beta"), post(3, "gamma")],
            Some("c1"),
        ),
        page(vec![post(11, "alpha"), post(12, "beta"), post(13, "gamma")], None),
    ]);

    let result = run(&source, 50, None).await;
    assert_eq!(result.items.len(), 3);
    assert_eq!(result.pages_fetched, 2);
    assert_eq!(result.stop_reason, StopReason::NoNewItems);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn item_limit_truncates_last_page() {
    let source = ScriptedSource::new(vec![
        page(vec![post(1, "a"), post(2, "b"), post(3, "c")], Some("c1")),
        page(
            vec![post(4, "d"), post(5, "e"), post(6, "f"), post(7, "g")],
            Some("c2"),
        ),
        page(vec![post(8, "h")], None),
    ]);

    let result = run(&source, 50, Some(5)).await;
    assert_eq!(result.items.len(), 5);
    assert_eq!(result.pages_fetched, 2);
    assert_eq!(result.stop_reason, StopReason::ItemLimit);
    assert_eq!(result.last_cursor.as_deref(), Some("c2"));
    let ids: Vec<_> = result
        .items
        .iter()
        .filter_map(|i| i.get("id").and_then(Value::as_str))
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn cursors_are_passed_back_in_order() {
    let source = ScriptedSource::new(vec![
        page(vec![post(1, "a")], Some("first")),
        page(vec![post(2, "b")], Some("second")),
        page(vec![post(3, "c")], None),
    ]);

    let result = run(&source, 50, None).await;
    assert_eq!(result.stop_reason, StopReason::EndOfStream);
    assert_eq!(
        *source.cursors.lock().await,
        vec![None, Some("first".to_string()), Some("second".to_string())]
    );
}

#[tokio::test]
async fn empty_first_page_ends_run() {
    let source = ScriptedSource::new(vec![page(Vec::new(), Some("c1"))]);
    let result = run(&source, 50, None).await;
    assert!(result.items.is_empty());
    assert_eq!(result.pages_fetched, 1);
    assert_eq!(result.stop_reason, StopReason::NoNewItems);
}

#[tokio::test]
async fn cyclic_cursor_hits_page_limit() {
    let pages = (0..10)
        .map(|n| page(vec![post(n, &format!("post {n}"))], Some("loop")))
        .collect();
    let source = ScriptedSource::new(pages);

    let result = run(&source, 4, None).await;
    assert_eq!(result.stop_reason, StopReason::PageLimit);
    assert_eq!(source.calls(), 4);
}

#[test]
fn nested_media_wrapper_is_unwrapped() {
    let raw = json!({"data": {"items": [
        {"media": {"pk": 7, "caption": {"text": "inner"}}, "ranking": 1}
    ]}});
    let items = extract_items(&raw);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("pk"), Some(&json!(7)));
    assert!(items[0].get("ranking").is_none());
}

#[tokio::test(start_paused = true)]
async fn governor_spaces_pages_but_not_the_first() {
    let source = ScriptedSource::new(vec![
        page(vec![post(1, "a")], Some("c1")),
        page(vec![post(2, "b")], Some("c2")),
        page(vec![post(3, "c")], None),
    ]);
    let start = Instant::now();

    let result = Aggregator::new(RateGovernor::new(PAGINATION_DELAY), 50)
        .aggregate(&source, None, None)
        .await;
    assert!(result.is_ok());

    let times = source.call_times.lock().await.clone();
    assert_eq!(times.len(), 3);
    assert!(times[0] - start < Duration::from_millis(10));
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= PAGINATION_DELAY);
        assert!(gap < PAGINATION_DELAY + Duration::from_millis(100));
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    else {
        panic!("failed to build runtime");
    };
    runtime.block_on(future)
}

/// Pages of small ids so that duplicates within and across pages are common.
fn scripted_pages() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(prop::collection::vec(1u32..30, 0..8), 1..12).prop_map(|pages| {
        let last = pages.len() - 1;
        pages
            .into_iter()
            .enumerate()
            .map(|(n, ids)| {
                let items = ids
                    .into_iter()
                    .map(|id| post(id, &format!("caption {id}")))
                    .collect();
                let cursor = format!("c{n}");
                page(items, (n < last).then_some(cursor.as_str()))
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn results_never_share_a_fingerprint_key(pages in scripted_pages(), max_pages in 1usize..15) {
        let source = ScriptedSource::new(pages);
        let result = block_on(run(&source, max_pages, None));

        let mut seen = SeenSet::new();
        for item in &result.items {
            prop_assert!(seen.admit(&Fingerprint::of(item)));
        }
    }

    #[test]
    fn fetch_calls_respect_page_bound(pages in scripted_pages(), max_pages in 1usize..15) {
        let source = ScriptedSource::new(pages);
        let result = block_on(run(&source, max_pages, None));

        prop_assert!(source.calls() <= max_pages);
        prop_assert_eq!(source.calls(), result.pages_fetched);
    }

    #[test]
    fn item_limit_is_exact_when_reachable(pages in scripted_pages(), k in 1usize..20) {
        let unbounded = block_on(run(&ScriptedSource::new(pages.clone()), 50, None));
        let bounded = block_on(run(&ScriptedSource::new(pages), 50, Some(k)));

        prop_assert!(bounded.items.len() <= k);
        if unbounded.items.len() >= k {
            prop_assert_eq!(bounded.items.len(), k);
            prop_assert_eq!(&bounded.items[..], &unbounded.items[..k]);
        } else {
            prop_assert_eq!(bounded.items.len(), unbounded.items.len());
        }
    }

    #[test]
    fn fingerprint_is_idempotent(id in 0u32..1000, caption in ".{0,150}", image in "[a-z]{0,12}") {
        let mut item = json!({"id": id, "caption": caption});
        if !image.is_empty() {
            item["image_url"] = json!(format!("https://cdn.test/{image}.jpg"));
        }
        let Some(item) = item.as_object() else {
            panic!("item must be an object");
        };
        let first = Fingerprint::of(item);
        let second = Fingerprint::of(item);
        prop_assert_eq!(first.keys(), second.keys());
        prop_assert_eq!(first, second);
    }
}
