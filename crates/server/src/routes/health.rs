use std::sync::Arc;

use axum::{Extension, Json};
use coach::engine::EngineFactory;
use serde_json::{json, Value as JsonValue};

use crate::state::AppState;

/// GET /health
pub async fn health_check<F: EngineFactory>(
    Extension(state): Extension<Arc<AppState<F>>>,
) -> Json<JsonValue> {
    let status = if state.pool.is_closed() { "closing" } else { "ok" };
    Json(json!({
        "status": status,
        "pool": {
            "size": state.pool.size(),
            "idle": state.pool.idle(),
        },
    }))
}
