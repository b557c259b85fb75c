use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::error::{EngagementError, EngagementResult};

/// Kind of engagement event, as written by ingestion in the `event` field.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventKind {
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Dropped,
    Complained,
}

/// Tenant scope every query is bound to.
///
/// Authorization happens upstream; this only guarantees the value is usable
/// as a filter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainScope(String);

impl DomainScope {
    pub fn parse(raw: &str) -> EngagementResult<Self> {
        required("domain", raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DomainScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims `raw` and rejects it when empty.
pub(crate) fn required(name: &str, raw: &str) -> EngagementResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(EngagementError::InvalidArgument(format!("{} is required", name)));
    }
    Ok(value.to_string())
}

/// One immutable engagement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub id: String,
    pub domain: String,
    pub msg_id: String,
    pub email: String,
    pub event: EventKind,
    pub date: DateTime<Utc>,
    /// Present on `clicked` events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// One outbound email. `opened`/`clicked` are ingestion-maintained counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: String,
    pub domain: String,
    pub msg_id: String,
    pub date: DateTime<Utc>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub opened: u64,
    pub clicked: u64,
}

impl Message {
    /// Moves the subject out, leaving the rest of the message as a nested payload.
    pub fn split_subject(self) -> (String, LinkedMessage) {
        let linked = LinkedMessage {
            id: self.id,
            domain: self.domain,
            msg_id: self.msg_id,
            date: self.date,
            tags: self.tags,
            opened: self.opened,
            clicked: self.clicked,
        };
        (self.subject, linked)
    }
}

/// A [`Message`] nested under an event, with its subject hoisted to the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LinkedMessage {
    pub id: String,
    pub domain: String,
    pub msg_id: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub opened: u64,
    pub clicked: u64,
}

/// One `(domain, email)` pair. Counters are advisory and only used for sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Recipient {
    pub id: String,
    pub domain: String,
    pub email: String,
    pub last_seen: DateTime<Utc>,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
}

/// Feed row: the event plus its message subject (empty when the message is unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FeedEntry {
    #[serde(flatten)]
    pub event: Event,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub message: Message,
    pub deliveries: u64,
    pub opens: u64,
    /// Distinct recipients among `opened` events
    pub unique_opens: u64,
    pub clicks: u64,
    /// Distinct recipients among `clicked` events
    pub unique_clicks: u64,
    /// Every event of the message, newest first
    pub logs: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipientLog {
    #[serde(flatten)]
    pub event: Event,
    pub subject: String,
    pub mail: LinkedMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RecipientDetail {
    pub email: String,
    pub opens: u64,
    /// Distinct messages among `opened` events
    pub unique_opens: u64,
    pub clicks: u64,
    /// Distinct clicked urls, first seen first
    pub urls: Vec<String>,
    pub deliveries: u64,
    /// Events joined to an existing message, newest first
    pub logs: Vec<RecipientLog>,
}

// ---------------------------------------------------------------------------
// Raw query parameters. Everything arrives as an untrusted string and is
// resolved leniently by the engines.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct FeedParams {
    /// `date` (default), `email` or `event`
    pub sort: Option<String>,
    /// `asc`, anything else is descending
    pub dir: Option<String>,
    /// Event kinds to keep; repeat the parameter for several. Unknown kinds are ignored.
    #[serde(default)]
    pub action: Vec<String>,
    /// Inclusive range, `"<start> to <end>"` with ISO-8601 dates or timestamps
    pub date: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Allow-listed per endpoint; unknown values use the endpoint default
    pub sort: Option<String>,
    /// `asc`, anything else is descending
    pub dir: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ColdParams {
    /// `last_seen` (default), `email`, `clicked`, `opened` or `delivered`
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
    /// Inactivity window in whole days; derived from the latest send when absent
    pub days: Option<String>,
}

impl ColdParams {
    pub(crate) fn list_params(&self) -> ListParams {
        ListParams {
            sort: self.sort.clone(),
            dir: self.dir.clone(),
            offset: self.offset.clone(),
            limit: self.limit.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Write-side records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub domain: String,
    pub msg_id: String,
    pub email: String,
    pub event: EventKind,
    pub date: DateTime<Utc>,
    pub url: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NewEvent {
    pub fn new(
        domain: impl Into<String>,
        msg_id: impl Into<String>,
        email: impl Into<String>,
        event: EventKind,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            domain: domain.into(),
            msg_id: msg_id.into(),
            email: email.into(),
            event,
            date,
            url: None,
            tags: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub domain: String,
    pub msg_id: String,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub tags: Option<Vec<String>>,
    pub opened: u64,
    pub clicked: u64,
}

impl NewMessage {
    pub fn new(
        domain: impl Into<String>,
        msg_id: impl Into<String>,
        subject: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            domain: domain.into(),
            msg_id: msg_id.into(),
            date,
            subject: subject.into(),
            tags: None,
            opened: 0,
            clicked: 0,
        }
    }

    pub fn with_counters(mut self, opened: u64, clicked: u64) -> Self {
        self.opened = opened;
        self.clicked = clicked;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipient {
    pub domain: String,
    pub email: String,
    pub last_seen: DateTime<Utc>,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
}

impl NewRecipient {
    pub fn new(domain: impl Into<String>, email: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        Self {
            domain: domain.into(),
            email: email.into(),
            last_seen,
            delivered: 0,
            opened: 0,
            clicked: 0,
        }
    }

    pub fn with_counters(mut self, delivered: u64, opened: u64, clicked: u64) -> Self {
        self.delivered = delivered;
        self.opened = opened;
        self.clicked = clicked;
        self
    }
}

/// Documents removed by a whole-domain teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub events: u64,
    pub messages: u64,
    pub recipients: u64,
    pub domains: u64,
}
