//! API routes, nested under `/api` by `axum_helpers::create_router`.

pub mod health;

use axum::{Router, middleware};
use observability::middleware::metrics_middleware;

use crate::state::AppState;

pub fn routes(state: &AppState) -> Router {
    Router::new()
        .merge(domain_engagement::handlers::router(state.engagement.clone()))
        .route_layer(middleware::from_fn(metrics_middleware))
        .merge(health::router(state.clone()))
}
