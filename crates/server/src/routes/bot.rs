use std::sync::Arc;

use axum::{Extension, Json};
use coach::bot::{BotMoveRequest, BotMoveResponse};
use coach::engine::EngineFactory;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/bot/move
pub async fn bot_move<F: EngineFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
    Json(request): Json<BotMoveRequest>,
) -> Result<Json<BotMoveResponse>, AppError> {
    let profile = state
        .profiles
        .get(&request.bot_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown bot: {}", request.bot_id)))?;

    let mut rng = StdRng::seed_from_u64(rand::random());
    let response = state.bots.select_move(profile, &request, &mut rng).await?;
    Ok(Json(response))
}
