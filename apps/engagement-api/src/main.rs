use axum::{Router, routing::get};
use axum_helpers::server::{create_production_app, create_router, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_engagement::{EngagementServices, MongoEngagementStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    observability::init_metrics().map_err(|e| eyre::eyre!("Metrics recorder: {}", e))?;

    info!("Connecting to MongoDB at {}", config.mongodb.url());
    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = mongo_client.database(config.mongodb.database());

    let store = MongoEngagementStore::new(&db, &config.query);
    store.apply_index_plan().await?;
    info!(database = config.mongodb.database(), "Engagement store ready");

    let engagement = EngagementServices::new(Arc::new(store), config.query.clone());
    let state = AppState {
        config,
        mongo_client,
        engagement,
    };

    let api_routes = api::routes(&state);
    let router = create_router::<openapi::ApiDoc>(api_routes, &state.config.server).await?;

    let app = router
        .merge(health_router(state.config.app))
        .merge(Router::new().route("/metrics", get(observability::metrics_handler)));

    info!("Starting Engagement API with production-ready shutdown (30s timeout)");

    let client = state.mongo_client.clone();
    create_production_app(app, &state.config.server, Duration::from_secs(30), async move {
        info!("Shutting down: closing MongoDB connections");
        client.shutdown().await;
        info!("MongoDB connection closed successfully");
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Engagement API shutdown complete");
    Ok(())
}
