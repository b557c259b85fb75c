//! MongoDB implementation of EngagementStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    Collection, Database,
    bson::{Document, doc},
};
use std::time::Duration;
use tracing::instrument;

use crate::config::QueryConfig;
use crate::documents::{
    EventDocument, MessageDocument, RecipientDocument, decode_feed_row, decode_joined_row,
    to_bson_date, to_chrono,
};
use crate::error::{EngagementError, EngagementResult};
use crate::filter::{EventFilter, RecipientFilter};
use crate::index_plan::{self, DOMAINS, EVENTS, INDEX_PLAN_VERSION, MESSAGES, RECIPIENTS};
use crate::models::{
    DomainScope, Event, FeedEntry, Message, NewEvent, NewMessage, NewRecipient, PurgeReport,
    Recipient,
};
use crate::pagination::{
    FeedSort, MessageSort, PageRequest, RecipientSort, Sort, SortDirection, SortKey,
};
use crate::repository::EngagementStore;

/// MongoDB-backed [`EngagementStore`]. Cloning shares the client pool.
#[derive(Clone)]
pub struct MongoEngagementStore {
    events: Collection<EventDocument>,
    messages: Collection<MessageDocument>,
    recipients: Collection<RecipientDocument>,
    domains: Collection<Document>,
    max_time: Duration,
}

impl MongoEngagementStore {
    pub fn new(db: &Database, config: &QueryConfig) -> Self {
        Self {
            events: db.collection(EVENTS),
            messages: db.collection(MESSAGES),
            recipients: db.collection(RECIPIENTS),
            domains: db.collection(DOMAINS),
            max_time: config.query_timeout,
        }
    }

    /// Creates every index of the plan. Existing indexes with the same
    /// definition are left alone by the server.
    pub async fn apply_index_plan(&self) -> EngagementResult<()> {
        let events: Vec<_> = index_plan::for_collection(EVENTS).map(|s| s.to_model()).collect();
        let messages: Vec<_> = index_plan::for_collection(MESSAGES).map(|s| s.to_model()).collect();
        let recipients: Vec<_> =
            index_plan::for_collection(RECIPIENTS).map(|s| s.to_model()).collect();

        let created = events.len() + messages.len() + recipients.len();
        self.events.create_indexes(events).await?;
        self.messages.create_indexes(messages).await?;
        self.recipients.create_indexes(recipients).await?;

        tracing::info!(version = INDEX_PLAN_VERSION, indexes = created, "Engagement index plan applied");
        Ok(())
    }

    fn sort_document<K: SortKey>(sort: Sort<K>) -> Document {
        let dir = sort.direction.as_i32();
        let mut doc = Document::new();
        doc.insert(sort.key.field(), dir);
        doc.insert("_id", dir);
        doc
    }

    fn event_filter(filter: &EventFilter) -> Document {
        let mut doc = doc! { "domain": filter.domain.as_str() };

        if !filter.kinds.is_empty() {
            let kinds: Vec<&str> = filter.kinds.iter().map(|k| k.as_ref()).collect();
            doc.insert("event", doc! { "$in": kinds });
        }

        if let Some(range) = filter.date {
            doc.insert(
                "date",
                doc! { "$gte": to_bson_date(range.start), "$lte": to_bson_date(range.end) },
            );
        }

        doc
    }

    fn recipient_filter(filter: &RecipientFilter) -> Document {
        let mut doc = doc! { "domain": filter.domain.as_str() };
        if let Some(cutoff) = filter.last_seen_before {
            doc.insert("last_seen", doc! { "$lte": to_bson_date(cutoff) });
        }
        doc
    }

    /// Joins the event's message on `(msg_id, domain)` into a one-element `mail` array.
    fn message_lookup() -> Document {
        doc! {
            "$lookup": {
                "from": MESSAGES,
                "localField": "msg_id",
                "foreignField": "msg_id",
                "let": { "domain": "$domain" },
                "pipeline": [
                    { "$match": { "$expr": { "$eq": ["$domain", "$$domain"] } } },
                    { "$limit": 1 },
                ],
                "as": "mail",
            }
        }
    }

    fn feed_pipeline(filter: &EventFilter, sort: Sort<FeedSort>, page: PageRequest) -> Vec<Document> {
        vec![
            doc! { "$match": Self::event_filter(filter) },
            doc! { "$sort": Self::sort_document(sort) },
            doc! { "$skip": page.offset as i64 },
            doc! { "$limit": page.limit as i64 },
            Self::message_lookup(),
            doc! { "$unwind": { "path": "$mail", "preserveNullAndEmptyArrays": true } },
            doc! { "$addFields": { "subject": { "$ifNull": ["$mail.subject", ""] } } },
            doc! { "$project": { "mail": 0 } },
        ]
    }

    fn recipient_pipeline(domain: &DomainScope, email: &str) -> Vec<Document> {
        let newest_first = Sort::new(FeedSort::Date, SortDirection::Desc);
        vec![
            doc! { "$match": { "domain": domain.as_str(), "email": email } },
            doc! { "$sort": Self::sort_document(newest_first) },
            Self::message_lookup(),
            doc! { "$unwind": "$mail" },
        ]
    }
}

fn try_into_all<D, T>(docs: Vec<D>) -> EngagementResult<Vec<T>>
where
    T: TryFrom<D, Error = EngagementError>,
{
    docs.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl EngagementStore for MongoEngagementStore {
    #[instrument(skip(self))]
    async fn count_events(&self, filter: &EventFilter) -> EngagementResult<u64> {
        let count = self
            .events
            .count_documents(Self::event_filter(filter))
            .max_time(self.max_time)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn find_feed(
        &self,
        filter: &EventFilter,
        sort: Sort<FeedSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<FeedEntry>> {
        let cursor = self
            .events
            .aggregate(Self::feed_pipeline(filter, sort, page))
            .max_time(self.max_time)
            .await?;
        let rows: Vec<Document> = cursor.try_collect().await?;

        rows.into_iter()
            .map(|row| decode_feed_row(row).map(|(event, subject)| FeedEntry { event, subject }))
            .collect()
    }

    #[instrument(skip(self))]
    async fn find_message(
        &self,
        domain: &DomainScope,
        msg_id: &str,
    ) -> EngagementResult<Option<Message>> {
        let found = self
            .messages
            .find_one(doc! { "msg_id": msg_id, "domain": domain.as_str() })
            .max_time(self.max_time)
            .await?;
        found.map(Message::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_message_events(
        &self,
        domain: &DomainScope,
        msg_id: &str,
    ) -> EngagementResult<Vec<Event>> {
        let cursor = self
            .events
            .find(doc! { "msg_id": msg_id, "domain": domain.as_str() })
            .sort(doc! { "date": -1, "_id": -1 })
            .max_time(self.max_time)
            .await?;
        let docs: Vec<EventDocument> = cursor.try_collect().await?;
        try_into_all(docs)
    }

    #[instrument(skip(self))]
    async fn find_recipient_events(
        &self,
        domain: &DomainScope,
        email: &str,
    ) -> EngagementResult<Vec<(Event, Message)>> {
        let cursor = self
            .events
            .aggregate(Self::recipient_pipeline(domain, email))
            .max_time(self.max_time)
            .await?;
        let rows: Vec<Document> = cursor.try_collect().await?;
        rows.into_iter().map(decode_joined_row).collect()
    }

    #[instrument(skip(self))]
    async fn count_messages(&self, domain: &DomainScope) -> EngagementResult<u64> {
        let count = self
            .messages
            .count_documents(doc! { "domain": domain.as_str() })
            .max_time(self.max_time)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn list_messages(
        &self,
        domain: &DomainScope,
        sort: Sort<MessageSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<Message>> {
        let cursor = self
            .messages
            .find(doc! { "domain": domain.as_str() })
            .sort(Self::sort_document(sort))
            .skip(page.offset)
            .limit(page.limit as i64)
            .max_time(self.max_time)
            .await?;
        let docs: Vec<MessageDocument> = cursor.try_collect().await?;
        try_into_all(docs)
    }

    #[instrument(skip(self))]
    async fn latest_message_date(
        &self,
        domain: &DomainScope,
    ) -> EngagementResult<Option<DateTime<Utc>>> {
        let latest = self
            .messages
            .find_one(doc! { "domain": domain.as_str() })
            .sort(doc! { "date": -1 })
            .max_time(self.max_time)
            .await?;
        latest.map(|m| to_chrono(m.date)).transpose()
    }

    #[instrument(skip(self))]
    async fn count_recipients(&self, filter: &RecipientFilter) -> EngagementResult<u64> {
        let count = self
            .recipients
            .count_documents(Self::recipient_filter(filter))
            .max_time(self.max_time)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn list_recipients(
        &self,
        filter: &RecipientFilter,
        sort: Sort<RecipientSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<Recipient>> {
        let cursor = self
            .recipients
            .find(Self::recipient_filter(filter))
            .sort(Self::sort_document(sort))
            .skip(page.offset)
            .limit(page.limit as i64)
            .max_time(self.max_time)
            .await?;
        let docs: Vec<RecipientDocument> = cursor.try_collect().await?;
        try_into_all(docs)
    }

    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn insert_events(&self, events: Vec<NewEvent>) -> EngagementResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }
        let docs: Vec<EventDocument> = events.into_iter().map(EventDocument::from).collect();
        let result = self.events.insert_many(docs).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    #[instrument(skip(self, messages), fields(count = messages.len()))]
    async fn insert_messages(&self, messages: Vec<NewMessage>) -> EngagementResult<u64> {
        if messages.is_empty() {
            return Ok(0);
        }
        let docs: Vec<MessageDocument> = messages.into_iter().map(MessageDocument::from).collect();
        let result = self.messages.insert_many(docs).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    #[instrument(skip(self, recipients), fields(count = recipients.len()))]
    async fn insert_recipients(&self, recipients: Vec<NewRecipient>) -> EngagementResult<u64> {
        if recipients.is_empty() {
            return Ok(0);
        }
        let docs: Vec<RecipientDocument> =
            recipients.into_iter().map(RecipientDocument::from).collect();
        let result = self.recipients.insert_many(docs).await?;
        Ok(result.inserted_ids.len() as u64)
    }

    #[instrument(skip(self))]
    async fn purge_domain(&self, domain: &DomainScope) -> EngagementResult<PurgeReport> {
        let scope = doc! { "domain": domain.as_str() };

        let events = self.events.delete_many(scope.clone()).await?;
        let messages = self.messages.delete_many(scope.clone()).await?;
        let recipients = self.recipients.delete_many(scope.clone()).await?;
        let domains = self.domains.delete_many(scope).await?;

        let report = PurgeReport {
            events: events.deleted_count,
            messages: messages.deleted_count,
            recipients: recipients.deleted_count,
            domains: domains.deleted_count,
        };
        tracing::info!(domain = %domain, ?report, "Domain engagement data purged");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> DomainScope {
        DomainScope::parse("d1").unwrap()
    }

    #[test]
    fn test_sort_document_appends_id_tie_break() {
        let sort = MongoEngagementStore::sort_document(Sort::new(RecipientSort::Email, SortDirection::Asc));
        assert_eq!(sort, doc! { "email": 1, "_id": 1 });

        let sort = MongoEngagementStore::sort_document(Sort::<MessageSort>::default());
        assert_eq!(sort, doc! { "date": -1, "_id": -1 });
    }

    #[test]
    fn test_event_filter_document() {
        let filter = EventFilter::new(domain())
            .with_actions(["opened", "clicked"])
            .with_date(Some("2024-01-01 to 2024-01-02"));
        let doc = MongoEngagementStore::event_filter(&filter);

        assert_eq!(doc.get_str("domain").unwrap(), "d1");
        let kinds = doc.get_document("event").unwrap().get_array("$in").unwrap();
        assert_eq!(kinds.len(), 2);
        let date = doc.get_document("date").unwrap();
        assert!(date.contains_key("$gte") && date.contains_key("$lte"));
    }

    #[test]
    fn test_event_filter_without_kinds_or_date() {
        let filter = EventFilter::new(domain()).with_actions(["nope"]).with_date(Some("garbage"));
        assert_eq!(MongoEngagementStore::event_filter(&filter), doc! { "domain": "d1" });
    }

    #[test]
    fn test_recipient_filter_cutoff() {
        let cutoff = Utc::now();
        let filter = RecipientFilter::new(domain()).last_seen_before(cutoff);
        let doc = MongoEngagementStore::recipient_filter(&filter);
        assert!(doc.get_document("last_seen").unwrap().contains_key("$lte"));
    }

    #[test]
    fn test_feed_pipeline_pages_before_join() {
        let pipeline = MongoEngagementStore::feed_pipeline(
            &EventFilter::new(domain()),
            Sort::default(),
            PageRequest { offset: 40, limit: 20 },
        );
        let stages: Vec<&str> = pipeline.iter().map(|s| s.keys().next().unwrap().as_str()).collect();
        assert_eq!(
            stages,
            vec!["$match", "$sort", "$skip", "$limit", "$lookup", "$unwind", "$addFields", "$project"]
        );
        assert_eq!(pipeline[2].get_i64("$skip").unwrap(), 40);
    }

    #[test]
    fn test_recipient_pipeline_is_inner_join() {
        let pipeline = MongoEngagementStore::recipient_pipeline(&domain(), "a@x.com");
        assert_eq!(pipeline.last().unwrap().get_str("$unwind").unwrap(), "$mail");
        let matched = pipeline[0].get_document("$match").unwrap();
        assert_eq!(matched.get_str("email").unwrap(), "a@x.com");
    }
}
