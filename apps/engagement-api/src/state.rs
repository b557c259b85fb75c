//! Shared application state.

use domain_engagement::{EngagementServices, MongoEngagementStore};
use mongodb::Client;

/// Cloned into every handler; all fields are cheap `Arc`-backed clones.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// Shares one connection pool across clones
    pub mongo_client: Client,
    pub engagement: EngagementServices<MongoEngagementStore>,
}
