use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngagementResult;
use crate::filter::{EventFilter, RecipientFilter};
use crate::models::{
    DomainScope, Event, FeedEntry, Message, NewEvent, NewMessage, NewRecipient, PurgeReport,
    Recipient,
};
use crate::pagination::{FeedSort, MessageSort, PageRequest, RecipientSort, Sort};

/// Read access to the engagement collections, plus the write and teardown
/// paths used by ingestion tooling and tests.
///
/// Every read is scoped to one domain. Implementations sort on the requested
/// key and then on id in the same direction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngagementStore: Send + Sync {
    async fn count_events(&self, filter: &EventFilter) -> EngagementResult<u64>;

    /// Page of matching events joined to their message subject.
    async fn find_feed(
        &self,
        filter: &EventFilter,
        sort: Sort<FeedSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<FeedEntry>>;

    async fn find_message(
        &self,
        domain: &DomainScope,
        msg_id: &str,
    ) -> EngagementResult<Option<Message>>;

    /// All events of one message, newest first.
    async fn find_message_events(
        &self,
        domain: &DomainScope,
        msg_id: &str,
    ) -> EngagementResult<Vec<Event>>;

    /// Events of one recipient that join to a stored message, newest first.
    async fn find_recipient_events(
        &self,
        domain: &DomainScope,
        email: &str,
    ) -> EngagementResult<Vec<(Event, Message)>>;

    async fn count_messages(&self, domain: &DomainScope) -> EngagementResult<u64>;

    async fn list_messages(
        &self,
        domain: &DomainScope,
        sort: Sort<MessageSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<Message>>;

    /// Send date of the domain's newest message.
    async fn latest_message_date(
        &self,
        domain: &DomainScope,
    ) -> EngagementResult<Option<DateTime<Utc>>>;

    async fn count_recipients(&self, filter: &RecipientFilter) -> EngagementResult<u64>;

    async fn list_recipients(
        &self,
        filter: &RecipientFilter,
        sort: Sort<RecipientSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<Recipient>>;

    async fn insert_events(&self, events: Vec<NewEvent>) -> EngagementResult<u64>;

    async fn insert_messages(&self, messages: Vec<NewMessage>) -> EngagementResult<u64>;

    async fn insert_recipients(&self, recipients: Vec<NewRecipient>) -> EngagementResult<u64>;

    /// Deletes every event, message and recipient of the domain, and the domain record.
    async fn purge_domain(&self, domain: &DomainScope) -> EngagementResult<PurgeReport>;
}
