use std::time::Duration;

use anyhow::{Result, ensure};
use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::{
    config::CollectorConfig,
    metrics::RunSummary,
    places::PlaceSearch,
    schema::{Place, SearchResponse},
};

/// Result of a single page request.
///
/// `Failed` is handled like an empty last page by the pagination loop,
/// but stays distinguishable from a genuine end of results.
#[derive(Debug)]
pub enum PageOutcome {
    Page(SearchResponse),
    Failed { reason: String },
}

/// Why pagination of one query ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Accumulated places reached `max_results`
    CapReached,

    /// The API returned no continuation token
    Exhausted,

    /// A page request failed; places gathered before it are kept
    PageFailed(String),

    /// `max_pages_per_query` page requests were made
    PageLimit,
}

/// Everything collected for one query.
#[derive(Debug)]
pub struct QueryReport {
    pub query: String,
    pub places: Vec<Place>,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub stop: StopReason,
}

/// Aggregated output of a whole run.
#[derive(Debug)]
pub struct Collection {
    /// Places of all queries, in query order then page order
    pub places: Vec<Place>,
    pub summary: RunSummary,
}

/// Requests a single page and never fails.
///
/// Any backend error (transport, timeout, HTTP status, decoding) is
/// logged at info level and returned as `PageOutcome::Failed`.
pub async fn fetch_one_page(
    search: &dyn PlaceSearch,
    query: &str,
    page_token: Option<&str>,
) -> PageOutcome {
    match search.search_page(query, page_token).await {
        Ok(page) => PageOutcome::Page(page),
        Err(e) => {
            let reason = format!("{e:#}");
            info!(
                "[{}] page request for {:?} failed: {}",
                search.name(),
                query,
                reason
            );
            PageOutcome::Failed { reason }
        }
    }
}

/// Follows continuation tokens for one query until one of:
/// - the accumulated places reach `max_results` (checked before each
///   request, the last page is kept whole)
/// - the API stops returning a token
/// - a page request fails
/// - `max_pages_per_query` requests were made
///
/// Between two pages the loop sleeps `page_delay_ms`.
///
/// Errors only for a blank query, in which case nothing is sent.
pub async fn fetch_all_pages(
    search: &dyn PlaceSearch,
    query: &str,
    cfg: &CollectorConfig,
) -> Result<QueryReport> {
    ensure!(!query.trim().is_empty(), "query text is empty");

    let delay = Duration::from_millis(cfg.page_delay_ms);
    let mut places: Vec<Place> = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages_fetched = 0;
    let mut pages_failed = 0;

    let stop = loop {
        if places.len() >= cfg.max_results {
            break StopReason::CapReached;
        }

        match fetch_one_page(search, query, page_token.as_deref()).await {
            PageOutcome::Page(page) => {
                pages_fetched += 1;
                let next = page.next_token().map(str::to_owned);
                debug!(
                    "{:?} page {}: {} places, more={}",
                    query,
                    pages_fetched,
                    page.places.len(),
                    next.is_some()
                );
                places.extend(page.places);

                match next {
                    Some(_) if places.len() >= cfg.max_results => break StopReason::CapReached,
                    Some(_) if cfg.max_pages_per_query.is_some_and(|limit| pages_fetched >= limit) => {
                        warn!(
                            "{:?}: stopping after {} pages, API still returns tokens",
                            query, pages_fetched
                        );
                        break StopReason::PageLimit;
                    }
                    Some(token) => {
                        // Next-page tokens are not valid immediately
                        sleep(delay).await;
                        page_token = Some(token);
                    }
                    None => break StopReason::Exhausted,
                }
            }
            PageOutcome::Failed { reason } => {
                pages_failed += 1;
                break StopReason::PageFailed(reason);
            }
        }
    };

    Ok(QueryReport {
        query: query.to_string(),
        places,
        pages_fetched,
        pages_failed,
        stop,
    })
}

/// Runs every query in order and concatenates their places.
///
/// A failing query is logged and counted; the remaining queries still
/// run.
pub async fn fetch_all_queries(
    search: &dyn PlaceSearch,
    queries: &[String],
    cfg: &CollectorConfig,
) -> Collection {
    let mut summary = RunSummary::start(queries.len());
    let mut places = Vec::new();

    for (i, query) in queries.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, queries.len(), query);

        match fetch_all_pages(search, query, cfg).await {
            Ok(report) => {
                summary.pages_fetched += report.pages_fetched;
                summary.pages_failed += report.pages_failed;
                if report.stop == StopReason::PageLimit {
                    summary.page_limit_hits += 1;
                }
                info!(
                    "{:?}: {} places from {} pages ({:?})",
                    report.query,
                    report.places.len(),
                    report.pages_fetched,
                    report.stop
                );
                places.extend(report.places);
            }
            Err(e) => {
                summary.queries_failed += 1;
                error!("Query {:?} skipped: {:#}", query, e);
            }
        }
    }

    summary.places_collected = places.len();
    summary.finish();

    Collection { places, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cfg(max_results: usize, max_pages: Option<usize>) -> CollectorConfig {
        CollectorConfig {
            max_results,
            page_delay_ms: 0,
            max_pages_per_query: max_pages,
        }
    }

    fn place(id: &str) -> Place {
        json!({ "id": id }).as_object().unwrap().clone()
    }

    fn page(ids: &[&str], token: Option<&str>) -> Result<SearchResponse, String> {
        Ok(SearchResponse {
            places: ids.iter().map(|id| place(id)).collect(),
            next_page_token: token.map(str::to_string),
        })
    }

    fn ids(places: &[Place]) -> Vec<&str> {
        places.iter().map(|p| p["id"].as_str().unwrap()).collect()
    }

    /// Replays scripted pages per query; an exhausted script answers with
    /// an empty last page.
    #[derive(Default)]
    struct ScriptedSearch {
        pages: Mutex<HashMap<String, VecDeque<Result<SearchResponse, String>>>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedSearch {
        fn script(self, query: &str, pages: Vec<Result<SearchResponse, String>>) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(query.to_string(), pages.into());
            self
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PlaceSearch for ScriptedSearch {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn search_page(
            &self,
            query: &str,
            page_token: Option<&str>,
        ) -> anyhow::Result<SearchResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), page_token.map(str::to_string)));

            let next = self
                .pages
                .lock()
                .unwrap()
                .get_mut(query)
                .and_then(VecDeque::pop_front);
            match next {
                Some(Ok(page)) => Ok(page),
                Some(Err(msg)) => Err(anyhow::anyhow!(msg)),
                None => Ok(SearchResponse::default()),
            }
        }
    }

    /// Always returns a full page and another token.
    struct EndlessSearch {
        page_size: usize,
        calls: AtomicUsize,
    }

    impl EndlessSearch {
        fn new(page_size: usize) -> Self {
            Self {
                page_size,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl PlaceSearch for EndlessSearch {
        fn name(&self) -> &'static str {
            "endless"
        }

        async fn search_page(
            &self,
            _query: &str,
            _page_token: Option<&str>,
        ) -> anyhow::Result<SearchResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchResponse {
                places: (0..self.page_size)
                    .map(|i| place(&format!("{n}-{i}")))
                    .collect(),
                next_page_token: Some(format!("t{}", n + 1)),
            })
        }
    }

    /// Every request fails at the transport level.
    struct DownSearch {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PlaceSearch for DownSearch {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn search_page(
            &self,
            _query: &str,
            _page_token: Option<&str>,
        ) -> anyhow::Result<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn failed_request_becomes_failed_outcome() {
        let search = DownSearch { calls: AtomicUsize::new(0) };

        match fetch_one_page(&search, "restaurants in Poznań", None).await {
            PageOutcome::Failed { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_fetch_without_token_regardless_of_cap() {
        for max in [1, 2, 60, 10_000] {
            let search = ScriptedSearch::default().script("q", vec![page(&["a"], None)]);

            let report = fetch_all_pages(&search, "q", &cfg(max, None)).await.unwrap();

            assert_eq!(search.calls().len(), 1, "max_results={max}");
            assert_eq!(report.stop, StopReason::Exhausted);
            assert_eq!(ids(&report.places), vec!["a"]);
        }
    }

    #[tokio::test]
    async fn cap_is_checked_before_each_fetch() {
        let search = EndlessSearch::new(20);

        let report = fetch_all_pages(&search, "q", &cfg(50, None)).await.unwrap();

        // 20 -> 40 -> 60: the third page overshoots, no fourth request
        assert_eq!(search.calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.places.len(), 60);
        assert!(report.places.len() < 50 + 20);
        assert_eq!(report.stop, StopReason::CapReached);
    }

    #[tokio::test]
    async fn exact_cap_stops_even_with_token() {
        let search = EndlessSearch::new(20);

        let report = fetch_all_pages(&search, "q", &cfg(40, None)).await.unwrap();

        assert_eq!(search.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.places.len(), 40);
        assert_eq!(report.stop, StopReason::CapReached);
    }

    #[tokio::test]
    async fn tokens_are_threaded_through_pages() {
        let search = ScriptedSearch::default().script(
            "q",
            vec![
                page(&["a", "b"], Some("t1")),
                page(&["c"], Some("t2")),
                page(&["d"], None),
            ],
        );

        let report = fetch_all_pages(&search, "q", &cfg(100, None)).await.unwrap();

        assert_eq!(ids(&report.places), vec!["a", "b", "c", "d"]);
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(
            search.calls(),
            vec![
                ("q".to_string(), None),
                ("q".to_string(), Some("t1".to_string())),
                ("q".to_string(), Some("t2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn failing_transport_ends_query_after_one_call() {
        let search = DownSearch { calls: AtomicUsize::new(0) };

        let report = fetch_all_pages(&search, "q", &cfg(60, None)).await.unwrap();

        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert!(report.places.is_empty());
        assert_eq!(report.pages_failed, 1);
        assert!(matches!(report.stop, StopReason::PageFailed(_)));
    }

    #[tokio::test]
    async fn failure_mid_query_keeps_earlier_pages() {
        let search = ScriptedSearch::default().script(
            "q",
            vec![page(&["a", "b"], Some("t1")), Err("HTTP 503".to_string())],
        );

        let report = fetch_all_pages(&search, "q", &cfg(60, None)).await.unwrap();

        assert_eq!(ids(&report.places), vec!["a", "b"]);
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.stop, StopReason::PageFailed("HTTP 503".to_string()));
    }

    #[tokio::test]
    async fn page_ceiling_bounds_endless_tokens() {
        let search = EndlessSearch::new(0);

        let report = fetch_all_pages(&search, "q", &cfg(usize::MAX, Some(4)))
            .await
            .unwrap();

        assert_eq!(search.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.stop, StopReason::PageLimit);
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_a_request() {
        let search = ScriptedSearch::default();

        assert!(fetch_all_pages(&search, "   ", &cfg(60, None)).await.is_err());
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn queries_concatenate_in_order_and_failures_are_isolated() {
        let search = ScriptedSearch::default()
            .script("q1", vec![page(&["1a", "1b"], Some("x")), page(&["1c"], None)])
            .script("q2", vec![Err("timeout".to_string())])
            .script("q3", vec![page(&["3a"], None)]);
        let queries: Vec<String> = ["q1", " ", "q2", "q3"].iter().map(|q| q.to_string()).collect();

        let collection = fetch_all_queries(&search, &queries, &cfg(60, None)).await;

        assert_eq!(ids(&collection.places), vec!["1a", "1b", "1c", "3a"]);

        let summary = &collection.summary;
        assert_eq!(summary.queries_total, 4);
        assert_eq!(summary.queries_failed, 1);
        assert_eq!(summary.pages_fetched, 3);
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.places_collected, 4);
        assert!(summary.finished_at.is_some());
    }

    #[tokio::test]
    async fn page_limit_hits_are_counted() {
        let search = EndlessSearch::new(1);
        let queries = vec!["a".to_string(), "b".to_string()];

        let collection = fetch_all_queries(&search, &queries, &cfg(1_000, Some(2))).await;

        assert_eq!(collection.places.len(), 4);
        assert_eq!(collection.summary.page_limit_hits, 2);
    }

    /// The paused clock rounds timer deadlines up to whole milliseconds.
    fn assert_slept(start: tokio::time::Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "slept {elapsed:?}, expected {expected:?}"
        );
    }

    fn delayed_cfg(max_results: usize, delay_ms: u64) -> CollectorConfig {
        CollectorConfig {
            page_delay_ms: delay_ms,
            ..cfg(max_results, None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_only_between_pages() {
        let search = ScriptedSearch::default().script(
            "q",
            vec![
                page(&["a"], Some("t1")),
                page(&["b"], Some("t2")),
                page(&["c"], None),
            ],
        );

        let start = tokio::time::Instant::now();
        let report = fetch_all_pages(&search, "q", &delayed_cfg(100, 200)).await.unwrap();

        assert_eq!(report.pages_fetched, 3);
        assert_slept(start, Duration::from_millis(2 * 200));
    }

    #[tokio::test(start_paused = true)]
    async fn no_pause_after_capped_page() {
        let search = EndlessSearch::new(20);

        let start = tokio::time::Instant::now();
        let report = fetch_all_pages(&search, "q", &delayed_cfg(40, 200)).await.unwrap();

        assert_eq!(report.stop, StopReason::CapReached);
        assert_eq!(search.calls.load(Ordering::SeqCst), 2);
        assert_slept(start, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn no_pause_after_failed_page() {
        let search = DownSearch { calls: AtomicUsize::new(0) };

        let start = tokio::time::Instant::now();
        fetch_all_pages(&search, "q", &delayed_cfg(60, 200)).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn no_queries_means_empty_output() {
        let search = ScriptedSearch::default();

        let collection = fetch_all_queries(&search, &[], &cfg(60, None)).await;

        assert!(collection.places.is_empty());
        assert_eq!(collection.summary.queries_total, 0);
        assert!(search.calls().is_empty());
    }
}
