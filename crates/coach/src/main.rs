//! Batch game review
//!
//! Reviews one PGN file on a local engine and prints the review JSON. This is
//! the entry point the server delegates long games to.
//!
//! Usage: coach-review <pgn-file> [--depth N] [--multipv N] [--elo N]

use anyhow::Context;
use tracing::info;

use coach::config::CoachConfig;
use coach::engine::{EnginePool, UciProcessFactory};
use coach::review::{GameReviewer, ReviewMode, ReviewRequest};

/// Parse `--flag N` from CLI args
fn parse_flag(args: &[String], flag: &str) -> Option<u32> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let path = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .context("usage: coach-review <pgn-file> [--depth N] [--multipv N] [--elo N]")?;
    let pgn = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;

    let config = CoachConfig::from_env();
    let factory = UciProcessFactory::new(config.engine.clone(), config.engine_options.clone());
    let pool = EnginePool::new(factory, 1).await?;
    let reviewer = GameReviewer::new(pool.clone(), config.review_settings());

    let request = ReviewRequest {
        depth: parse_flag(&args, "--depth"),
        multi_pv: parse_flag(&args, "--multipv"),
        accuracy_for_elo: parse_flag(&args, "--elo"),
        review_mode: Some(ReviewMode::Local),
        ..ReviewRequest::new(pgn)
    };

    let result = reviewer.review(&request).await;
    pool.shutdown().await;
    let response = result?;

    info!(
        plies = response.moves.len(),
        accuracy = response.accuracy,
        "Review finished"
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
