//! OpenAPI documentation configuration

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Engagement API",
        version = "0.1.0",
        description = "Per-domain email engagement: activity feed, message and recipient rollups",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api", api = domain_engagement::ApiDoc)
    )
)]
pub struct ApiDoc;
