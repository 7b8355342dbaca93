use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coach::CoachError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl From<CoachError> for AppError {
    fn from(e: CoachError) -> Self {
        match e {
            CoachError::InvalidInput(msg) => AppError::BadRequest(msg),
            CoachError::Delegate(msg) => AppError::BadGateway(msg),
            CoachError::PoolClosed => AppError::Unavailable("Engine pool is closed".into()),
            CoachError::EngineInit(msg) | CoachError::EngineRuntime(msg) => {
                AppError::Unavailable(format!("Engine failure: {msg}"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadGateway(msg) => {
                tracing::warn!("Delegated review failed: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Unavailable(msg) => {
                tracing::warn!("Engine unavailable: {msg}");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Anyhow(e) => {
                tracing::error!("Unexpected error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        // Error body: {"detail": "message"}
        (status, Json(json!({ "detail": message }))).into_response()
    }
}
