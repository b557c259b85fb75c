//! In-process store for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::EngagementResult;
use crate::filter::{EventFilter, RecipientFilter};
use crate::models::{
    DomainScope, Event, FeedEntry, Message, NewEvent, NewMessage, NewRecipient, PurgeReport,
    Recipient,
};
use crate::pagination::{
    FeedSort, MessageSort, PageRequest, RecipientSort, Sort, SortDirection,
};
use crate::repository::EngagementStore;

#[derive(Debug, Default)]
struct Tables {
    events: Vec<Event>,
    messages: Vec<Message>,
    recipients: Vec<Recipient>,
}

/// [`EngagementStore`] over `Vec`s behind one `RwLock`. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngagementStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryEngagementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id() -> String {
    ObjectId::new().to_hex()
}

/// Sorts by `primary`, then by id, both in `direction`.
fn sort_by<T>(
    items: &mut [T],
    direction: SortDirection,
    primary: impl Fn(&T, &T) -> Ordering,
    id: impl Fn(&T) -> &str,
) {
    items.sort_by(|a, b| {
        let ordering = primary(a, b).then_with(|| id(a).cmp(id(b)));
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

fn event_matches(filter: &EventFilter, event: &Event) -> bool {
    event.domain == filter.domain.as_str()
        && filter.matches_kind(event.event)
        && filter.date.is_none_or(|range| range.contains(&event.date))
}

fn recipient_matches(filter: &RecipientFilter, recipient: &Recipient) -> bool {
    recipient.domain == filter.domain.as_str()
        && filter
            .last_seen_before
            .is_none_or(|cutoff| recipient.last_seen <= cutoff)
}

fn newest_first(events: &mut [Event]) {
    sort_by(events, SortDirection::Desc, |a, b| a.date.cmp(&b.date), |e| e.id.as_str());
}

#[async_trait]
impl EngagementStore for InMemoryEngagementStore {
    async fn count_events(&self, filter: &EventFilter) -> EngagementResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables.events.iter().filter(|e| event_matches(filter, e)).count() as u64)
    }

    async fn find_feed(
        &self,
        filter: &EventFilter,
        sort: Sort<FeedSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<FeedEntry>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| event_matches(filter, e))
            .cloned()
            .collect();

        sort_by(
            &mut events,
            sort.direction,
            |a, b| match sort.key {
                FeedSort::Date => a.date.cmp(&b.date),
                FeedSort::Email => a.email.cmp(&b.email),
                FeedSort::Event => a.event.as_ref().cmp(b.event.as_ref()),
            },
            |e| e.id.as_str(),
        );

        let entries = paginate(events, page)
            .into_iter()
            .map(|event| {
                let subject = tables
                    .messages
                    .iter()
                    .find(|m| m.msg_id == event.msg_id && m.domain == event.domain)
                    .map(|m| m.subject.clone())
                    .unwrap_or_default();
                FeedEntry { event, subject }
            })
            .collect();
        Ok(entries)
    }

    async fn find_message(
        &self,
        domain: &DomainScope,
        msg_id: &str,
    ) -> EngagementResult<Option<Message>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .find(|m| m.domain == domain.as_str() && m.msg_id == msg_id)
            .cloned())
    }

    async fn find_message_events(
        &self,
        domain: &DomainScope,
        msg_id: &str,
    ) -> EngagementResult<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.domain == domain.as_str() && e.msg_id == msg_id)
            .cloned()
            .collect();
        newest_first(&mut events);
        Ok(events)
    }

    async fn find_recipient_events(
        &self,
        domain: &DomainScope,
        email: &str,
    ) -> EngagementResult<Vec<(Event, Message)>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.domain == domain.as_str() && e.email == email)
            .cloned()
            .collect();
        newest_first(&mut events);

        Ok(events
            .into_iter()
            .filter_map(|event| {
                tables
                    .messages
                    .iter()
                    .find(|m| m.msg_id == event.msg_id && m.domain == event.domain)
                    .cloned()
                    .map(|message| (event, message))
            })
            .collect())
    }

    async fn count_messages(&self, domain: &DomainScope) -> EngagementResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.domain == domain.as_str())
            .count() as u64)
    }

    async fn list_messages(
        &self,
        domain: &DomainScope,
        sort: Sort<MessageSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.domain == domain.as_str())
            .cloned()
            .collect();

        sort_by(
            &mut messages,
            sort.direction,
            |a, b| match sort.key {
                MessageSort::Clicked => a.clicked.cmp(&b.clicked),
                MessageSort::Opened => a.opened.cmp(&b.opened),
                MessageSort::Date => a.date.cmp(&b.date),
            },
            |m| m.id.as_str(),
        );
        Ok(paginate(messages, page))
    }

    async fn latest_message_date(
        &self,
        domain: &DomainScope,
    ) -> EngagementResult<Option<DateTime<Utc>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.domain == domain.as_str())
            .map(|m| m.date)
            .max())
    }

    async fn count_recipients(&self, filter: &RecipientFilter) -> EngagementResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .recipients
            .iter()
            .filter(|r| recipient_matches(filter, r))
            .count() as u64)
    }

    async fn list_recipients(
        &self,
        filter: &RecipientFilter,
        sort: Sort<RecipientSort>,
        page: PageRequest,
    ) -> EngagementResult<Vec<Recipient>> {
        let tables = self.tables.read().await;
        let mut recipients: Vec<Recipient> = tables
            .recipients
            .iter()
            .filter(|r| recipient_matches(filter, r))
            .cloned()
            .collect();

        sort_by(
            &mut recipients,
            sort.direction,
            |a, b| match sort.key {
                RecipientSort::LastSeen => a.last_seen.cmp(&b.last_seen),
                RecipientSort::Email => a.email.cmp(&b.email),
                RecipientSort::Clicked => a.clicked.cmp(&b.clicked),
                RecipientSort::Opened => a.opened.cmp(&b.opened),
                RecipientSort::Delivered => a.delivered.cmp(&b.delivered),
            },
            |r| r.id.as_str(),
        );
        Ok(paginate(recipients, page))
    }

    async fn insert_events(&self, events: Vec<NewEvent>) -> EngagementResult<u64> {
        let mut tables = self.tables.write().await;
        let inserted = events.len() as u64;
        tables.events.extend(events.into_iter().map(|e| Event {
            id: next_id(),
            domain: e.domain,
            msg_id: e.msg_id,
            email: e.email,
            event: e.event,
            date: e.date,
            url: e.url,
            tags: e.tags,
        }));
        Ok(inserted)
    }

    async fn insert_messages(&self, messages: Vec<NewMessage>) -> EngagementResult<u64> {
        let mut tables = self.tables.write().await;
        let inserted = messages.len() as u64;
        tables.messages.extend(messages.into_iter().map(|m| Message {
            id: next_id(),
            domain: m.domain,
            msg_id: m.msg_id,
            date: m.date,
            subject: m.subject,
            tags: m.tags,
            opened: m.opened,
            clicked: m.clicked,
        }));
        Ok(inserted)
    }

    async fn insert_recipients(&self, recipients: Vec<NewRecipient>) -> EngagementResult<u64> {
        let mut tables = self.tables.write().await;
        let inserted = recipients.len() as u64;
        tables.recipients.extend(recipients.into_iter().map(|r| Recipient {
            id: next_id(),
            domain: r.domain,
            email: r.email,
            last_seen: r.last_seen,
            delivered: r.delivered,
            opened: r.opened,
            clicked: r.clicked,
        }));
        Ok(inserted)
    }

    async fn purge_domain(&self, domain: &DomainScope) -> EngagementResult<PurgeReport> {
        let mut tables = self.tables.write().await;
        let name = domain.as_str();

        let before = (tables.events.len(), tables.messages.len(), tables.recipients.len());
        tables.events.retain(|e| e.domain != name);
        tables.messages.retain(|m| m.domain != name);
        tables.recipients.retain(|r| r.domain != name);

        Ok(PurgeReport {
            events: (before.0 - tables.events.len()) as u64,
            messages: (before.1 - tables.messages.len()) as u64,
            recipients: (before.2 - tables.recipients.len()) as u64,
            domains: 0,
        })
    }
}
