use std::fmt;

use chrono::{DateTime, Utc};

/// Counters for a single collection run.
///
/// Purpose:
/// - Report partial failures instead of aborting the run
/// - Give one greppable summary line at the end
///
/// Owned by the collector loop and returned with the results; the run
/// is sequential, so plain integers are enough.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    // Queries
    pub queries_total: usize,
    pub queries_failed: usize,

    // Pages
    pub pages_fetched: usize,
    pub pages_failed: usize,

    // Queries cut off by the per-query page ceiling
    pub page_limit_hits: usize,

    pub places_collected: usize,
}

impl RunSummary {
    pub fn start(queries_total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            queries_total,
            queries_failed: 0,
            pages_fetched: 0,
            pages_failed: 0,
            page_limit_hits: 0,
            places_collected: 0,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall time of the run, zero until `finish` was called.
    pub fn elapsed_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }

    /// True when every query and every page went through and no query
    /// was cut off by the page ceiling.
    pub fn is_clean(&self) -> bool {
        self.queries_failed == 0 && self.pages_failed == 0 && self.page_limit_hits == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[SUMMARY] queries={} query_err={} pages={} page_err={} page_limit={} places={} started={} elapsed_ms={}",
            self.queries_total,
            self.queries_failed,
            self.pages_fetched,
            self.pages_failed,
            self.page_limit_hits,
            self.places_collected,
            self.started_at.to_rfc3339(),
            self.elapsed_ms(),
        )
    }
}
