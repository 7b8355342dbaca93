pub mod clients;
pub mod config;
pub mod error;
pub mod live_eval;
pub mod profiles;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use coach::engine::EngineFactory;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the router over an already constructed state.
pub fn app<F: EngineFactory>(state: Arc<AppState<F>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check::<F>))
        .route("/api/review", post(routes::review::review_game::<F>))
        .route("/api/bot/move", post(routes::bot::bot_move::<F>))
        .route("/ws/live-eval", get(routes::live_eval_ws::ws_handler::<F>))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
