use axum::response::{IntoResponse, Response};
use axum_helpers::{AppError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngagementError {
    /// Missing or blank domain, msg_id or email. Raised before any store access.
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    /// Store failure. `detail` is logged, never rendered.
    #[error("internal error")]
    Internal { detail: String },
}

impl EngagementError {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }
}

pub type EngagementResult<T> = Result<T, EngagementError>;

impl From<EngagementError> for AppError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            EngagementError::NotFound(msg) => AppError::NotFound(msg),
            EngagementError::Internal { detail } => {
                tracing::error!(detail = %detail, "engagement store failure");
                AppError::InternalServerError(ErrorCode::InternalError.default_message().to_string())
            }
        }
    }
}

impl IntoResponse for EngagementError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

impl From<mongodb::error::Error> for EngagementError {
    fn from(err: mongodb::error::Error) -> Self {
        EngagementError::internal(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for EngagementError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        EngagementError::internal(format!("bson decode: {}", err))
    }
}

impl From<mongodb::bson::ser::Error> for EngagementError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        EngagementError::internal(format!("bson encode: {}", err))
    }
}
