//! BSON shapes of the stored documents and their conversion into view models.

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, Document, oid::ObjectId};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::{EngagementError, EngagementResult};
use crate::models::{
    Event, EventKind, Message, NewEvent, NewMessage, NewRecipient, Recipient,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDocument {
    #[serde(rename = "_id")]
    pub id: Bson,
    pub domain: String,
    pub msg_id: String,
    pub email: String,
    pub event: String,
    pub date: bson::DateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDocument {
    #[serde(rename = "_id")]
    pub id: Bson,
    pub domain: String,
    pub msg_id: String,
    pub date: bson::DateTime,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "counter")]
    pub opened: u64,
    #[serde(default, deserialize_with = "counter")]
    pub clicked: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientDocument {
    #[serde(rename = "_id")]
    pub id: Bson,
    pub domain: String,
    pub email: String,
    pub last_seen: bson::DateTime,
    #[serde(default, deserialize_with = "counter")]
    pub delivered: u64,
    #[serde(default, deserialize_with = "counter")]
    pub opened: u64,
    #[serde(default, deserialize_with = "counter")]
    pub clicked: u64,
}

/// Ingestion writes counters as booleans or numbers; `true` counts as 1.
fn counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Bson::deserialize(deserializer)?;
    Ok(match value {
        Bson::Boolean(flag) => u64::from(flag),
        Bson::Int32(n) => n.max(0) as u64,
        Bson::Int64(n) => n.max(0) as u64,
        Bson::Double(n) if n.is_finite() && n > 0.0 => n as u64,
        _ => 0,
    })
}

/// Hex for ObjectIds, the raw value for string ids.
pub fn id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn to_chrono(date: bson::DateTime) -> EngagementResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(date.timestamp_millis()).ok_or_else(|| {
        EngagementError::internal(format!("stored date out of range: {}", date.timestamp_millis()))
    })
}

pub fn to_bson_date(date: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(date.timestamp_millis())
}

impl TryFrom<EventDocument> for Event {
    type Error = EngagementError;

    fn try_from(doc: EventDocument) -> EngagementResult<Self> {
        let event = EventKind::from_str(&doc.event).map_err(|_| {
            EngagementError::internal(format!("unknown event kind {:?} on {}", doc.event, id_string(&doc.id)))
        })?;

        Ok(Event {
            id: id_string(&doc.id),
            domain: doc.domain,
            msg_id: doc.msg_id,
            email: doc.email,
            event,
            date: to_chrono(doc.date)?,
            url: doc.url,
            tags: doc.tags,
        })
    }
}

impl TryFrom<MessageDocument> for Message {
    type Error = EngagementError;

    fn try_from(doc: MessageDocument) -> EngagementResult<Self> {
        Ok(Message {
            id: id_string(&doc.id),
            domain: doc.domain,
            msg_id: doc.msg_id,
            date: to_chrono(doc.date)?,
            subject: doc.subject,
            tags: doc.tags,
            opened: doc.opened,
            clicked: doc.clicked,
        })
    }
}

impl TryFrom<RecipientDocument> for Recipient {
    type Error = EngagementError;

    fn try_from(doc: RecipientDocument) -> EngagementResult<Self> {
        Ok(Recipient {
            id: id_string(&doc.id),
            domain: doc.domain,
            email: doc.email,
            last_seen: to_chrono(doc.last_seen)?,
            delivered: doc.delivered,
            opened: doc.opened,
            clicked: doc.clicked,
        })
    }
}

impl From<NewEvent> for EventDocument {
    fn from(input: NewEvent) -> Self {
        Self {
            id: Bson::ObjectId(ObjectId::new()),
            domain: input.domain,
            msg_id: input.msg_id,
            email: input.email,
            event: input.event.to_string(),
            date: to_bson_date(input.date),
            url: input.url,
            tags: input.tags,
        }
    }
}

impl From<NewMessage> for MessageDocument {
    fn from(input: NewMessage) -> Self {
        Self {
            id: Bson::ObjectId(ObjectId::new()),
            domain: input.domain,
            msg_id: input.msg_id,
            date: to_bson_date(input.date),
            subject: input.subject,
            tags: input.tags,
            opened: input.opened,
            clicked: input.clicked,
        }
    }
}

impl From<NewRecipient> for RecipientDocument {
    fn from(input: NewRecipient) -> Self {
        Self {
            id: Bson::ObjectId(ObjectId::new()),
            domain: input.domain,
            email: input.email,
            last_seen: to_bson_date(input.last_seen),
            delivered: input.delivered,
            opened: input.opened,
            clicked: input.clicked,
        }
    }
}

/// Feed aggregate row: an event document with `subject` added by the join.
pub fn decode_feed_row(doc: Document) -> EngagementResult<(Event, String)> {
    let subject = doc.get_str("subject").unwrap_or_default().to_string();
    let event: EventDocument = bson::from_document(doc)?;
    Ok((Event::try_from(event)?, subject))
}

/// Recipient aggregate row: an event document with the joined message under `mail`.
pub fn decode_joined_row(mut doc: Document) -> EngagementResult<(Event, Message)> {
    let mail = match doc.remove("mail") {
        Some(Bson::Document(mail)) => mail,
        other => {
            return Err(EngagementError::internal(format!(
                "joined row without mail document: {:?}",
                other
            )));
        }
    };

    let event: EventDocument = bson::from_document(doc)?;
    let message: MessageDocument = bson::from_document(mail)?;
    Ok((Event::try_from(event)?, Message::try_from(message)?))
}
