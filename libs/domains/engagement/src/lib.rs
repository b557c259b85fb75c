//! Engagement Domain
//!
//! Read-side queries over email engagement data: a per-domain activity feed,
//! message rollups and recipient rollups, backed by MongoDB.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints under /api/domains/{domain}
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │  Services   │  ← Feed, message and recipient engines; lenient paging
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │    Store    │  ← EngagementStore trait: MongoDB and in-memory
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Index plan  │  ← Applied once at start-up
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_engagement::{EngagementServices, MongoEngagementStore, QueryConfig, handlers};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = mongodb::Client::with_uri_str("mongodb://localhost:27017").await?;
//! let db = client.database("mailer");
//!
//! let config = QueryConfig::default();
//! let store = MongoEngagementStore::new(&db, &config);
//! store.apply_index_plan().await?;
//!
//! let router = handlers::router(EngagementServices::new(Arc::new(store), config));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod documents;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod index_plan;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod pagination;
pub mod repository;
pub mod rollup;
pub mod service;

pub use config::QueryConfig;
pub use error::{EngagementError, EngagementResult};
pub use filter::{DateRange, EventFilter, RecipientFilter};
pub use handlers::{ApiDoc, EngagementServices};
pub use index_plan::{INDEX_PLAN, INDEX_PLAN_VERSION, IndexSpec, covering};
pub use memory::InMemoryEngagementStore;
pub use models::{
    ColdParams, DomainScope, Event, EventKind, FeedEntry, FeedParams, LinkedMessage, ListParams,
    Message, MessageDetail, NewEvent, NewMessage, NewRecipient, PurgeReport, Recipient,
    RecipientDetail, RecipientLog,
};
pub use self::mongodb::MongoEngagementStore;
pub use pagination::{
    ColdRecipientPage, FeedSort, MessageSort, Page, PageRequest, RecipientSort, Sort,
    SortDirection, SortKey,
};
pub use repository::EngagementStore;
pub use service::{COLD_GRACE_DAYS, FeedService, MessageService, RecipientService};
