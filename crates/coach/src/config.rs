//! Engine and review configuration from environment variables

use std::env;
use std::str::FromStr;

use tracing::info;

use crate::engine::process::EngineCommand;
use crate::engine::EngineOptions;
use crate::review::ReviewSettings;

#[derive(Clone, Debug)]
pub struct CoachConfig {
    /// Engine binary and its arguments
    pub engine: EngineCommand,

    /// Number of engine processes kept warm
    pub pool_size: usize,

    /// Options every pooled engine starts with
    pub engine_options: EngineOptions,

    /// Default search depth for game review
    pub review_depth: u32,

    /// Lines requested for the position before each reviewed move
    pub review_multipv: u32,

    /// Longest game (in plies) reviewed locally in auto mode
    pub review_local_ply_threshold: usize,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl CoachConfig {
    /// Load configuration from environment variables. Unparseable values
    /// fall back to their defaults.
    pub fn from_env() -> Self {
        let path = env::var("STOCKFISH_PATH").unwrap_or_else(|_| "stockfish".to_string());
        let args = env::var("ENGINE_ARGS")
            .map(|v| v.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        let config = Self {
            engine: EngineCommand { path, args },
            pool_size: env_or("ENGINE_POOL_SIZE", num_cpus::get()).max(1),
            engine_options: EngineOptions {
                threads: env_or("ENGINE_THREADS", 1),
                hash_mb: env_or("ENGINE_HASH_MB", 64),
                ..EngineOptions::default()
            },
            review_depth: env_or("REVIEW_DEPTH", 16),
            review_multipv: env_or("REVIEW_MULTIPV", 3),
            review_local_ply_threshold: env_or("REVIEW_LOCAL_PLY_THRESHOLD", 80),
        };
        info!(
            engine = %config.engine.path,
            pool_size = config.pool_size,
            threads = config.engine_options.threads,
            "Coach config loaded"
        );
        config
    }

    pub fn review_settings(&self) -> ReviewSettings {
        ReviewSettings {
            depth: self.review_depth,
            multipv: self.review_multipv,
            local_ply_threshold: self.review_local_ply_threshold,
            engine_options: self.engine_options.clone(),
            ..ReviewSettings::default()
        }
    }
}
