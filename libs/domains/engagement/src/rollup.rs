//! Single-pass aggregation over an event stream.
//!
//! Counts come from the events themselves, never from the denormalized
//! `opened`/`clicked` counters on messages and recipients.

use std::collections::HashSet;
use std::hash::Hash;

use crate::models::{Event, EventKind, LinkedMessage, Message, MessageDetail, RecipientDetail, RecipientLog};

/// Set-keyed accumulator that also remembers first-seen order.
#[derive(Debug, Clone)]
pub struct DistinctSet<K> {
    seen: HashSet<K>,
    order: Vec<K>,
}

impl<K> Default for DistinctSet<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> DistinctSet<K> {
    /// Returns `true` when `key` was not seen before.
    pub fn insert(&mut self, key: K) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_vec(self) -> Vec<K> {
        self.order
    }
}

/// Per-message counters; uniqueness is by recipient email.
#[derive(Debug, Default)]
pub struct MessageRollup {
    deliveries: u64,
    opens: u64,
    clicks: u64,
    openers: DistinctSet<String>,
    clickers: DistinctSet<String>,
}

impl MessageRollup {
    pub fn observe(&mut self, event: &Event) {
        match event.event {
            EventKind::Delivered => self.deliveries += 1,
            EventKind::Opened => {
                self.opens += 1;
                self.openers.insert(event.email.clone());
            }
            EventKind::Clicked => {
                self.clicks += 1;
                self.clickers.insert(event.email.clone());
            }
            EventKind::Bounced | EventKind::Dropped | EventKind::Complained => {}
        }
    }

    /// Folds `logs` (already newest first) into the detail view.
    pub fn build(message: Message, logs: Vec<Event>) -> MessageDetail {
        let mut rollup = Self::default();
        for event in &logs {
            rollup.observe(event);
        }

        MessageDetail {
            message,
            deliveries: rollup.deliveries,
            opens: rollup.opens,
            unique_opens: rollup.openers.len() as u64,
            clicks: rollup.clicks,
            unique_clicks: rollup.clickers.len() as u64,
            logs,
        }
    }
}

/// Per-recipient counters; uniqueness of opens is by message, urls by value.
#[derive(Debug, Default)]
pub struct RecipientRollup {
    deliveries: u64,
    opens: u64,
    clicks: u64,
    opened_messages: DistinctSet<String>,
    urls: DistinctSet<String>,
}

impl RecipientRollup {
    pub fn observe(&mut self, event: &Event) {
        match event.event {
            EventKind::Delivered => self.deliveries += 1,
            EventKind::Opened => {
                self.opens += 1;
                self.opened_messages.insert(event.msg_id.clone());
            }
            EventKind::Clicked => {
                self.clicks += 1;
                if let Some(url) = &event.url {
                    self.urls.insert(url.clone());
                }
            }
            EventKind::Bounced | EventKind::Dropped | EventKind::Complained => {}
        }
    }

    /// Folds joined `(event, message)` rows (already newest first) into the detail view.
    pub fn build(email: String, rows: Vec<(Event, Message)>) -> RecipientDetail {
        let mut rollup = Self::default();
        let mut logs = Vec::with_capacity(rows.len());

        for (event, message) in rows {
            rollup.observe(&event);
            let (subject, mail): (String, LinkedMessage) = message.split_subject();
            logs.push(RecipientLog { event, subject, mail });
        }

        RecipientDetail {
            email,
            opens: rollup.opens,
            unique_opens: rollup.opened_messages.len() as u64,
            clicks: rollup.clicks,
            urls: rollup.urls.into_vec(),
            deliveries: rollup.deliveries,
            logs,
        }
    }
}
