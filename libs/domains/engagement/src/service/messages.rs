use std::sync::Arc;
use tracing::instrument;

use observability::QueryMetrics;

use super::{MESSAGE_DETAIL, MESSAGE_LIST, observed, validated};
use crate::config::QueryConfig;
use crate::error::{EngagementError, EngagementResult};
use crate::models::{DomainScope, ListParams, Message, MessageDetail, required};
use crate::pagination::{ListOptions, MessageSort, Page};
use crate::repository::EngagementStore;
use crate::rollup::MessageRollup;

/// Message list and per-message rollups.
pub struct MessageService<S: EngagementStore> {
    store: Arc<S>,
    config: QueryConfig,
}

impl<S: EngagementStore> Clone for MessageService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: EngagementStore> MessageService<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        Self { store, config }
    }

    /// Sort allow-list: `clicked`, `opened`, `date` (default).
    #[instrument(skip(self, params), fields(domain = %domain))]
    pub async fn list(&self, domain: &str, params: ListParams) -> EngagementResult<Page<Message>> {
        let domain = validated(MESSAGE_LIST, DomainScope::parse(domain))?;
        let options = ListOptions::<MessageSort>::resolve(&params, &self.config);

        let timer = QueryMetrics::start(MESSAGE_LIST);
        let result = tokio::try_join!(
            self.store.count_messages(&domain),
            self.store.list_messages(&domain, options.sort, options.page),
        )
        .map(|(total, data)| Page::new(total, options.page, data));

        observed(timer, result, |p| p.data.len())
    }

    /// The message plus exact counters computed from its events.
    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn detail(&self, domain: &str, msg_id: &str) -> EngagementResult<MessageDetail> {
        let (domain, msg_id) = validated(
            MESSAGE_DETAIL,
            DomainScope::parse(domain).and_then(|d| Ok((d, required("msg_id", msg_id)?))),
        )?;

        let timer = QueryMetrics::start(MESSAGE_DETAIL);
        let result = self.load_detail(&domain, &msg_id).await;
        observed(timer, result, |d| d.logs.len())
    }

    async fn load_detail(&self, domain: &DomainScope, msg_id: &str) -> EngagementResult<MessageDetail> {
        let message = self
            .store
            .find_message(domain, msg_id)
            .await?
            .ok_or_else(|| EngagementError::NotFound("Mail not found".to_string()))?;

        let logs = self.store.find_message_events(domain, msg_id).await?;
        Ok(MessageRollup::build(message, logs))
    }
}
