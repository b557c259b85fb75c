use std::sync::Arc;
use tracing::instrument;

use observability::QueryMetrics;

use super::{FEED, observed, validated};
use crate::config::QueryConfig;
use crate::error::EngagementResult;
use crate::filter::EventFilter;
use crate::models::{DomainScope, FeedEntry, FeedParams};
use crate::pagination::{FeedSort, Page, PageRequest, Sort};
use crate::repository::EngagementStore;

/// Domain activity feed: filtered, sorted events with their message subject.
pub struct FeedService<S: EngagementStore> {
    store: Arc<S>,
    config: QueryConfig,
}

impl<S: EngagementStore> Clone for FeedService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: EngagementStore> FeedService<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// - `action`: unknown kinds are dropped; none left means every kind
    /// - `date`: `"<start> to <end>"`, ignored when malformed
    /// - `sort`: `date` (default), `email`, `event`
    #[instrument(skip(self, params), fields(domain = %domain))]
    pub async fn feed(&self, domain: &str, params: FeedParams) -> EngagementResult<Page<FeedEntry>> {
        let domain = validated(FEED, DomainScope::parse(domain))?;

        let filter = EventFilter::new(domain)
            .with_actions(&params.action)
            .with_date(params.date.as_deref());
        let sort = Sort::<FeedSort>::resolve(params.sort.as_deref(), params.dir.as_deref());
        let page = PageRequest::resolve(params.offset.as_deref(), params.limit.as_deref(), &self.config);

        let timer = QueryMetrics::start(FEED);
        let result = tokio::try_join!(
            self.store.count_events(&filter),
            self.store.find_feed(&filter, sort, page),
        )
        .map(|(total, data)| Page::new(total, page, data));

        observed(timer, result, |p| p.data.len())
    }
}
