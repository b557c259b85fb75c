//! Declarative index plan for the engagement collections.
//!
//! Applied once at start-up by [`MongoEngagementStore::apply_index_plan`](crate::MongoEngagementStore::apply_index_plan).
//! Query code never creates indexes. [`covering`] lets tests assert that each
//! query shape the engines issue has a left-prefix index.

use mongodb::IndexModel;
use mongodb::bson::{Document, doc};
use mongodb::options::IndexOptions;

/// Bump when [`INDEX_PLAN`] changes.
pub const INDEX_PLAN_VERSION: u32 = 1;

pub const EVENTS: &str = "logs";
pub const MESSAGES: &str = "mails";
pub const RECIPIENTS: &str = "users";
pub const DOMAINS: &str = "domains";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: &'static str,
    /// Ordered `(field, direction)`; direction is `1` or `-1`.
    pub keys: &'static [(&'static str, i32)],
    /// Partial index over documents where this field exists.
    pub partial_exists: Option<&'static str>,
    pub sparse: bool,
}

impl IndexSpec {
    const fn plain(collection: &'static str, keys: &'static [(&'static str, i32)]) -> Self {
        Self {
            collection,
            keys,
            partial_exists: None,
            sparse: false,
        }
    }

    const fn partial(
        collection: &'static str,
        keys: &'static [(&'static str, i32)],
        field: &'static str,
    ) -> Self {
        Self {
            collection,
            keys,
            partial_exists: Some(field),
            sparse: false,
        }
    }

    const fn sparse(collection: &'static str, keys: &'static [(&'static str, i32)]) -> Self {
        Self {
            collection,
            keys,
            partial_exists: None,
            sparse: true,
        }
    }

    /// Server-style name, e.g. `domain_1_date_-1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, dir)| format!("{}_{}", field, dir))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn key_document(&self) -> Document {
        let mut keys = Document::new();
        for (field, dir) in self.keys {
            keys.insert(*field, *dir);
        }
        keys
    }

    pub fn to_model(&self) -> IndexModel {
        let options = IndexOptions::builder()
            .name(self.name())
            .sparse(self.sparse.then_some(true))
            .partial_filter_expression(self.partial_exists.map(|field| {
                let mut filter = Document::new();
                filter.insert(field, doc! { "$exists": true });
                filter
            }))
            .build();

        IndexModel::builder()
            .keys(self.key_document())
            .options(options)
            .build()
    }

    /// True when `fields` is a left prefix of this index's keys.
    pub fn covers(&self, fields: &[&str]) -> bool {
        !fields.is_empty()
            && fields.len() <= self.keys.len()
            && fields.iter().zip(self.keys).all(|(field, (key, _))| field == key)
    }
}

pub const INDEX_PLAN: &[IndexSpec] = &[
    // Events
    IndexSpec::plain(EVENTS, &[("domain", 1)]),
    IndexSpec::plain(EVENTS, &[("msg_id", 1), ("domain", 1)]),
    IndexSpec::plain(EVENTS, &[("domain", 1), ("email", 1)]),
    IndexSpec::plain(EVENTS, &[("domain", 1), ("event", 1)]),
    IndexSpec::plain(EVENTS, &[("domain", 1), ("date", 1)]),
    IndexSpec::partial(EVENTS, &[("domain", 1), ("tags", 1)], "tags"),
    IndexSpec::sparse(EVENTS, &[("url", 1)]),
    // Messages
    IndexSpec::plain(MESSAGES, &[("domain", 1)]),
    IndexSpec::plain(MESSAGES, &[("msg_id", 1), ("domain", 1)]),
    IndexSpec::plain(MESSAGES, &[("domain", 1), ("date", -1)]),
    IndexSpec::plain(MESSAGES, &[("domain", 1), ("clicked", 1)]),
    IndexSpec::plain(MESSAGES, &[("domain", 1), ("opened", 1)]),
    IndexSpec::partial(MESSAGES, &[("domain", 1), ("tags", 1)], "tags"),
    // Recipients
    IndexSpec::plain(RECIPIENTS, &[("domain", 1)]),
    IndexSpec::plain(RECIPIENTS, &[("domain", 1), ("last_seen", -1)]),
    IndexSpec::plain(RECIPIENTS, &[("domain", 1), ("email", 1)]),
    IndexSpec::plain(RECIPIENTS, &[("domain", 1), ("opened", 1)]),
    IndexSpec::plain(RECIPIENTS, &[("domain", 1), ("delivered", 1)]),
    IndexSpec::plain(RECIPIENTS, &[("domain", 1), ("clicked", 1)]),
];

/// Indexes of one collection, in plan order.
pub fn for_collection(collection: &str) -> impl Iterator<Item = &'static IndexSpec> + '_ {
    INDEX_PLAN.iter().filter(move |spec| spec.collection == collection)
}

/// Narrowest planned index on `collection` whose keys start with `fields`.
pub fn covering(collection: &str, fields: &[&str]) -> Option<&'static IndexSpec> {
    for_collection(collection)
        .filter(|spec| spec.covers(fields))
        .min_by_key(|spec| spec.keys.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{FeedSort, MessageSort, RecipientSort, SortKey};

    #[test]
    fn test_plan_size_and_names_are_unique_per_collection() {
        assert_eq!(INDEX_PLAN.len(), 19);
        for collection in [EVENTS, MESSAGES, RECIPIENTS] {
            let mut names: Vec<String> = for_collection(collection).map(IndexSpec::name).collect();
            let before = names.len();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), before, "duplicate index name in {}", collection);
        }
    }

    #[test]
    fn test_descending_keys() {
        assert_eq!(
            covering(MESSAGES, &["domain", "date"]).unwrap().name(),
            "domain_1_date_-1"
        );
        assert_eq!(
            covering(RECIPIENTS, &["domain", "last_seen"]).unwrap().name(),
            "domain_1_last_seen_-1"
        );
    }

    #[test]
    fn test_partial_and_sparse_options() {
        let tags = covering(EVENTS, &["domain", "tags"]).unwrap();
        let model = tags.to_model();
        let options = model.options.unwrap();
        assert_eq!(
            options.partial_filter_expression,
            Some(doc! { "tags": { "$exists": true } })
        );
        assert_eq!(options.sparse, None);

        let url = covering(EVENTS, &["url"]).unwrap();
        let options = url.to_model().options.unwrap();
        assert_eq!(options.sparse, Some(true));
        assert_eq!(options.name.as_deref(), Some("url_1"));
    }

    #[test]
    fn test_key_document_preserves_order() {
        let spec = covering(EVENTS, &["msg_id", "domain"]).unwrap();
        let key_doc = spec.key_document();
        let keys: Vec<&str> = key_doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["msg_id", "domain"]);
    }

    #[test]
    fn test_covering_picks_narrowest() {
        assert_eq!(covering(EVENTS, &["domain"]).unwrap().keys.len(), 1);
        assert!(covering(EVENTS, &["email"]).is_none());
        assert!(covering(EVENTS, &[]).is_none());
    }

    #[test]
    fn test_every_feed_shape_is_covered() {
        for sort in [FeedSort::Date, FeedSort::Email, FeedSort::Event] {
            assert!(
                covering(EVENTS, &["domain", sort.field()]).is_some(),
                "feed sort {} uncovered",
                sort.field()
            );
        }
        // Kind filter and date range
        assert!(covering(EVENTS, &["domain", "event"]).is_some());
        assert!(covering(EVENTS, &["domain", "date"]).is_some());
    }

    #[test]
    fn test_every_message_shape_is_covered() {
        for sort in [MessageSort::Date, MessageSort::Opened, MessageSort::Clicked] {
            assert!(covering(MESSAGES, &["domain", sort.field()]).is_some());
        }
        // Detail lookup and its event scan
        assert!(covering(MESSAGES, &["msg_id", "domain"]).is_some());
        assert!(covering(EVENTS, &["msg_id", "domain"]).is_some());
    }

    #[test]
    fn test_every_recipient_shape_is_covered() {
        for sort in [
            RecipientSort::LastSeen,
            RecipientSort::Email,
            RecipientSort::Opened,
            RecipientSort::Clicked,
            RecipientSort::Delivered,
        ] {
            assert!(covering(RECIPIENTS, &["domain", sort.field()]).is_some());
        }
        // Detail scan, join, and cold-list cutoff
        assert!(covering(EVENTS, &["domain", "email"]).is_some());
        assert!(covering(MESSAGES, &["msg_id", "domain"]).is_some());
        assert!(covering(RECIPIENTS, &["domain", "last_seen"]).is_some());
    }

    #[test]
    fn test_plan_version_is_set() {
        assert!(INDEX_PLAN_VERSION >= 1);
    }
}
