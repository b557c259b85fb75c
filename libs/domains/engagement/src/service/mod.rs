//! Query engines: input resolution, store orchestration and rollups.
//!
//! Each engine validates its required arguments before touching the store,
//! then issues independent reads concurrently.

mod feed;
mod messages;
mod recipients;

pub use feed::FeedService;
pub use messages::MessageService;
pub use recipients::{COLD_GRACE_DAYS, RecipientService};

use observability::{QueryMetrics, QueryTimer};

use crate::error::{EngagementError, EngagementResult};

pub(crate) const FEED: &str = "feed";
pub(crate) const MESSAGE_LIST: &str = "message_list";
pub(crate) const MESSAGE_DETAIL: &str = "message_detail";
pub(crate) const RECIPIENT_LIST: &str = "recipient_list";
pub(crate) const RECIPIENT_COLD: &str = "recipient_cold";
pub(crate) const RECIPIENT_DETAIL: &str = "recipient_detail";

/// Records an argument rejection for `query` and passes the result through.
pub(crate) fn validated<T>(query: &'static str, result: EngagementResult<T>) -> EngagementResult<T> {
    if result.is_err() {
        QueryMetrics::record_rejected(query);
    }
    result
}

/// Closes `timer` with the outcome of `result`.
pub(crate) fn observed<T>(
    timer: QueryTimer,
    result: EngagementResult<T>,
    rows: impl FnOnce(&T) -> usize,
) -> EngagementResult<T> {
    match &result {
        Ok(value) => timer.success(rows(value)),
        Err(EngagementError::NotFound(_)) => timer.not_found(),
        Err(_) => timer.failure(),
    }
    result
}
