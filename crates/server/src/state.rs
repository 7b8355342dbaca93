//! Shared application state handed to every route.

use std::sync::Arc;

use coach::bot::BotMoveSelector;
use coach::engine::{EngineFactory, EnginePool};
use coach::review::{BatchReviewer, GameReviewer};

use crate::config::Config;
use crate::live_eval::LiveEvalSettings;
use crate::profiles::BotProfiles;

pub struct AppState<F: EngineFactory> {
    pub config: Config,
    pub pool: EnginePool<F>,
    pub reviewer: GameReviewer<F>,
    pub bots: BotMoveSelector<F>,
    pub profiles: BotProfiles,
}

impl<F: EngineFactory> AppState<F> {
    /// Every consumer shares the one pool.
    pub fn new(
        config: Config,
        pool: EnginePool<F>,
        profiles: BotProfiles,
        delegate: Option<Arc<dyn BatchReviewer>>,
    ) -> Self {
        let mut reviewer = GameReviewer::new(pool.clone(), config.coach.review_settings());
        if let Some(delegate) = delegate {
            reviewer = reviewer.with_delegate(delegate);
        }
        let bots = BotMoveSelector::new(pool.clone(), config.coach.engine_options.clone());
        Self {
            config,
            pool,
            reviewer,
            bots,
            profiles,
        }
    }

    pub fn live_eval_settings(&self) -> LiveEvalSettings {
        LiveEvalSettings {
            depth: self.config.live_eval_depth,
            movetime_ms: self.config.live_eval_movetime_ms,
            options: self.config.coach.engine_options.clone(),
        }
    }
}
