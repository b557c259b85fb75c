//! Metrics for the feed, message and recipient query engines.

use metrics::{counter, histogram};
use std::time::Instant;

/// Static recorder for engagement query metrics.
///
/// `query` labels are a fixed set chosen by the engines
/// (`feed`, `message_list`, `message_detail`, `recipient_list`,
/// `recipient_cold`, `recipient_detail`), so label cardinality stays bounded.
pub struct QueryMetrics;

impl QueryMetrics {
    pub fn start(query: &'static str) -> QueryTimer {
        QueryTimer {
            query,
            started: Instant::now(),
        }
    }

    /// Arguments rejected before any store access.
    pub fn record_rejected(query: &'static str) {
        counter!("engagement_queries_total", "query" => query, "outcome" => "rejected")
            .increment(1);
    }
}

/// Measures one query from [`QueryMetrics::start`] until it is consumed.
#[must_use = "finish the timer with success() or failure()"]
pub struct QueryTimer {
    query: &'static str,
    started: Instant,
}

impl QueryTimer {
    pub fn success(self, rows: usize) {
        self.finish("ok");
        histogram!("engagement_query_rows", "query" => self.query).record(rows as f64);
        tracing::debug!(query = self.query, rows, "engagement query completed");
    }

    pub fn not_found(self) {
        self.finish("not_found");
    }

    pub fn failure(self) {
        self.finish("error");
    }

    fn finish(&self, outcome: &'static str) {
        let elapsed = self.started.elapsed();
        counter!("engagement_queries_total", "query" => self.query, "outcome" => outcome)
            .increment(1);
        histogram!("engagement_query_duration_seconds", "query" => self.query)
            .record(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_outcomes_do_not_panic() {
        QueryMetrics::start("feed").success(3);
        QueryMetrics::start("message_detail").not_found();
        QueryMetrics::start("recipient_detail").failure();
        QueryMetrics::record_rejected("feed");
    }
}
