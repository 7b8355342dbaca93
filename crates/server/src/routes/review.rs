use std::sync::Arc;

use axum::{Extension, Json};
use coach::engine::EngineFactory;
use coach::review::{ReviewRequest, ReviewResponse};

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/review
///
/// Reviews a whole game. Any failure fails the whole request; no partial
/// results are returned.
pub async fn review_game<F: EngineFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    let response = state.reviewer.review(&request).await?;
    tracing::info!(
        "Reviewed {} plies, accuracy {:.1}",
        response.moves.len(),
        response.accuracy
    );
    Ok(Json(response))
}
