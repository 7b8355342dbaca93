use std::sync::Arc;

use anyhow::Context;
use server::clients::batch::HttpBatchReviewer;
use server::config;
use server::profiles::BotProfiles;
use server::state::AppState;

use coach::engine::{EnginePool, UciProcessFactory};
use coach::review::BatchReviewer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    // Start engines; a failed handshake aborts startup
    tracing::info!(
        "Starting {} engine(s) from {}",
        config.coach.pool_size,
        config.coach.engine.path
    );
    let factory = UciProcessFactory::new(
        config.coach.engine.clone(),
        config.coach.engine_options.clone(),
    );
    let pool = EnginePool::new(factory, config.coach.pool_size)
        .await
        .context("Failed to start engine pool")?;

    let profiles = BotProfiles::load_or_empty(&config.bot_profiles_path);
    if profiles.is_empty() {
        tracing::warn!("No bot profiles loaded; bot moves will be rejected");
    }

    // Delegated review for long games (optional)
    let delegate: Option<Arc<dyn BatchReviewer>> = match &config.review_batch_url {
        Some(url) => {
            tracing::info!("Batch review delegate configured at {url}");
            let reviewer: Arc<dyn BatchReviewer> = Arc::new(HttpBatchReviewer::new(url.clone())?);
            Some(reviewer)
        }
        None => {
            tracing::info!("No batch review delegate - all reviews run locally");
            None
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, pool.clone(), profiles, delegate));
    let app = server::app(state);

    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    pool.shutdown().await;
    tracing::info!("Engine pool shut down");
    Ok(())
}
