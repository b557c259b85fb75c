//! HTTP handlers for the engagement query API

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_helpers::errors::responses::{
    BadRequestResponse, InternalServerErrorResponse, NotFoundResponse,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::config::QueryConfig;
use crate::error::EngagementResult;
use crate::models::{
    ColdParams, Event, EventKind, FeedEntry, FeedParams, LinkedMessage, ListParams, Message,
    MessageDetail, Recipient, RecipientDetail, RecipientLog,
};
use crate::pagination::{ColdRecipientPage, Page, SortDirection};
use crate::repository::EngagementStore;
use crate::service::{FeedService, MessageService, RecipientService};

/// OpenAPI documentation for the engagement API
#[derive(OpenApi)]
#[openapi(
    paths(
        get_feed,
        list_mails,
        get_mail,
        list_users,
        list_cold_users,
        get_user,
    ),
    components(
        schemas(
            Event, EventKind, FeedEntry, Message, LinkedMessage, MessageDetail,
            Recipient, RecipientLog, RecipientDetail, SortDirection
        ),
        responses(BadRequestResponse, NotFoundResponse, InternalServerErrorResponse)
    ),
    tags(
        (name = "Feed", description = "Domain activity feed"),
        (name = "Mails", description = "Sent messages and their engagement"),
        (name = "Users", description = "Recipients and their engagement")
    )
)]
pub struct ApiDoc;

/// The three query engines over one shared store.
pub struct EngagementServices<S: EngagementStore> {
    pub feed: FeedService<S>,
    pub messages: MessageService<S>,
    pub recipients: RecipientService<S>,
}

impl<S: EngagementStore> EngagementServices<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        Self {
            feed: FeedService::new(Arc::clone(&store), config.clone()),
            messages: MessageService::new(Arc::clone(&store), config.clone()),
            recipients: RecipientService::new(store, config),
        }
    }
}

impl<S: EngagementStore> Clone for EngagementServices<S> {
    fn clone(&self) -> Self {
        Self {
            feed: self.feed.clone(),
            messages: self.messages.clone(),
            recipients: self.recipients.clone(),
        }
    }
}

/// Routes, relative to the `/api` nest.
///
/// `users/cold` is a static segment and wins over `users/{email}`, so a
/// recipient whose address is literally `cold` has no detail route.
pub fn router<S: EngagementStore + 'static>(services: EngagementServices<S>) -> Router {
    Router::new()
        .route("/domains/{domain}/feed", get(get_feed::<S>))
        .route("/domains/{domain}/mails", get(list_mails::<S>))
        .route("/domains/{domain}/mails/{msg_id}", get(get_mail::<S>))
        .route("/domains/{domain}/users", get(list_users::<S>))
        .route("/domains/{domain}/users/cold", get(list_cold_users::<S>))
        .route("/domains/{domain}/users/{email}", get(get_user::<S>))
        .with_state(services)
}

/// Activity feed of a domain
///
/// Repeat `action` to select several event kinds.
#[utoipa::path(
    get,
    path = "/domains/{domain}/feed",
    tag = "Feed",
    params(
        ("domain" = String, Path, description = "Domain name"),
        FeedParams
    ),
    responses(
        (status = 200, description = "Page of feed entries", body = Page<FeedEntry>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_feed<S: EngagementStore>(
    State(services): State<EngagementServices<S>>,
    Path(domain): Path<String>,
    axum_extra::extract::Query(params): axum_extra::extract::Query<FeedParams>,
) -> EngagementResult<Json<Page<FeedEntry>>> {
    let page = services.feed.feed(&domain, params).await?;
    Ok(Json(page))
}

/// Messages sent by a domain
#[utoipa::path(
    get,
    path = "/domains/{domain}/mails",
    tag = "Mails",
    params(
        ("domain" = String, Path, description = "Domain name"),
        ListParams
    ),
    responses(
        (status = 200, description = "Page of messages", body = Page<Message>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_mails<S: EngagementStore>(
    State(services): State<EngagementServices<S>>,
    Path(domain): Path<String>,
    Query(params): Query<ListParams>,
) -> EngagementResult<Json<Page<Message>>> {
    let page = services.messages.list(&domain, params).await?;
    Ok(Json(page))
}

/// One message with its engagement counters and event log
#[utoipa::path(
    get,
    path = "/domains/{domain}/mails/{msg_id}",
    tag = "Mails",
    params(
        ("domain" = String, Path, description = "Domain name"),
        ("msg_id" = String, Path, description = "Message id")
    ),
    responses(
        (status = 200, description = "Message detail", body = MessageDetail),
        (status = 400, response = BadRequestResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_mail<S: EngagementStore>(
    State(services): State<EngagementServices<S>>,
    Path((domain, msg_id)): Path<(String, String)>,
) -> EngagementResult<Json<MessageDetail>> {
    let detail = services.messages.detail(&domain, &msg_id).await?;
    Ok(Json(detail))
}

/// Recipients of a domain
#[utoipa::path(
    get,
    path = "/domains/{domain}/users",
    tag = "Users",
    params(
        ("domain" = String, Path, description = "Domain name"),
        ListParams
    ),
    responses(
        (status = 200, description = "Page of recipients", body = Page<Recipient>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_users<S: EngagementStore>(
    State(services): State<EngagementServices<S>>,
    Path(domain): Path<String>,
    Query(params): Query<ListParams>,
) -> EngagementResult<Json<Page<Recipient>>> {
    let page = services.recipients.list(&domain, params).await?;
    Ok(Json(page))
}

/// Recipients inactive for `days`
#[utoipa::path(
    get,
    path = "/domains/{domain}/users/cold",
    tag = "Users",
    params(
        ("domain" = String, Path, description = "Domain name"),
        ColdParams
    ),
    responses(
        (status = 200, description = "Page of cold recipients with the applied window", body = ColdRecipientPage<Recipient>),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_cold_users<S: EngagementStore>(
    State(services): State<EngagementServices<S>>,
    Path(domain): Path<String>,
    Query(params): Query<ColdParams>,
) -> EngagementResult<Json<ColdRecipientPage<Recipient>>> {
    let page = services.recipients.cold(&domain, params).await?;
    Ok(Json(page))
}

/// One recipient with engagement counters and joined event log
///
/// The address `cold` is served by the cold list instead.
#[utoipa::path(
    get,
    path = "/domains/{domain}/users/{email}",
    tag = "Users",
    params(
        ("domain" = String, Path, description = "Domain name"),
        ("email" = String, Path, description = "Recipient email")
    ),
    responses(
        (status = 200, description = "Recipient detail", body = RecipientDetail),
        (status = 400, response = BadRequestResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_user<S: EngagementStore>(
    State(services): State<EngagementServices<S>>,
    Path((domain, email)): Path<(String, String)>,
) -> EngagementResult<Json<RecipientDetail>> {
    let detail = services.recipients.detail(&domain, &email).await?;
    Ok(Json(detail))
}
