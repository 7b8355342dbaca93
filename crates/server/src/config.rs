use std::env;

use coach::config::CoachConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub bot_profiles_path: String,
    /// Batch review endpoint for long games; unset reviews everything locally
    pub review_batch_url: Option<String>,
    pub live_eval_depth: u32,
    pub live_eval_movetime_ms: u64,
    pub coach: CoachConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            bot_profiles_path: env::var("BOT_PROFILES_PATH")
                .unwrap_or_else(|_| "data/bot_profiles.json".to_string()),
            review_batch_url: env::var("REVIEW_BATCH_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            live_eval_depth: env::var("LIVE_EVAL_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(18),
            live_eval_movetime_ms: env::var("LIVE_EVAL_MOVETIME_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
            coach: CoachConfig::from_env(),
        }
    }
}
