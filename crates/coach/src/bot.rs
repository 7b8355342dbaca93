//! Bot opponent moves: weighted opening book first, then engine candidates
//! with controlled randomness.

use chess_core::GameBoard;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{
    EngineFactory, EngineOptions, EnginePool, EvaluationLine, SearchLimits, UciEngine,
};
use crate::error::CoachError;

/// Top evaluations at or beyond this magnitude always play rank 1.
pub const DECISIVE_EVAL_CP: i32 = 90_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrengthConfig {
    pub skill_level: Option<u8>,
    pub elo_cap: Option<u32>,
    pub contempt: Option<i32>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub multipv: Option<u32>,
    pub depth: Option<u32>,
    pub movetime_ms: Option<u64>,
    pub nodes: Option<u64>,
}

/// Per-rank weights (index 0 = rank 1) and how far below rank 1 a candidate
/// may score and still be considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomnessConfig {
    pub weights: Vec<f64>,
    pub max_cp_loss: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLine {
    pub moves: Vec<String>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotProfile {
    pub id: String,
    pub name: String,
    pub elo: u32,
    #[serde(default)]
    pub strength: StrengthConfig,
    #[serde(default)]
    pub randomness: Option<RandomnessConfig>,
    #[serde(default)]
    pub book: Vec<BookLine>,
}

impl BotProfile {
    pub fn engine_options(&self, base: &EngineOptions) -> EngineOptions {
        EngineOptions {
            threads: self.strength.threads.unwrap_or(base.threads),
            hash_mb: self.strength.hash_mb.unwrap_or(base.hash_mb),
            skill_level: self.strength.skill_level,
            elo: self.strength.elo_cap,
            contempt: self.strength.contempt,
        }
    }

    pub fn search_limits(&self) -> SearchLimits {
        let ranks = self.randomness.as_ref().map_or(1, |r| r.weights.len() as u32);
        SearchLimits {
            movetime_ms: self.strength.movetime_ms,
            nodes: self.strength.nodes,
            depth: self.strength.depth,
            multipv: self.strength.multipv.unwrap_or(ranks).max(1),
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMoveRequest {
    pub bot_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub moves: Vec<String>,
    #[serde(default)]
    pub initial_fen: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveSource {
    Book,
    Engine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMoveAnalysis {
    pub source: MoveSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    /// Centipawns from the bot's side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    pub candidates: Vec<EvaluationLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMove {
    pub fen_before: String,
    pub fen_after: String,
    /// SAN
    #[serde(rename = "move")]
    pub mv: String,
    pub uci: String,
    pub analysis: BotMoveAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOverResult {
    pub status: String,
    pub reason: String,
    pub fen: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BotMoveResponse {
    Move(BotMove),
    GameOver(GameOverResult),
}

/// Weighted index pick. Non-positive and non-finite weights never win.
pub fn weighted_pick<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let usable = |w: f64| w.is_finite() && w > 0.0;
    let total: f64 = weights.iter().copied().filter(|w| usable(*w)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.random_range(0.0..total);
    for (i, w) in weights.iter().copied().enumerate() {
        if !usable(w) {
            continue;
        }
        if roll < w {
            return Some(i);
        }
        roll -= w;
    }
    weights.iter().copied().rposition(usable)
}

/// Next book move for `history`, matched case-insensitively by prefix.
pub fn book_candidate<R: Rng + ?Sized>(
    book: &[BookLine],
    history: &[String],
    rng: &mut R,
) -> Option<String> {
    let matches: Vec<(&str, f64)> = book
        .iter()
        .filter(|line| line.moves.len() > history.len())
        .filter(|line| {
            line.moves
                .iter()
                .zip(history)
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
        })
        .map(|line| (line.moves[history.len()].as_str(), line.weight.unwrap_or(1.0)))
        .collect();
    let weights: Vec<f64> = matches.iter().map(|(_, w)| *w).collect();
    weighted_pick(rng, &weights).map(|i| matches[i].0.to_string())
}

/// Index into `lines` the bot should play.
pub fn choose_rank<R: Rng + ?Sized>(
    lines: &[EvaluationLine],
    randomness: Option<&RandomnessConfig>,
    rng: &mut R,
) -> usize {
    let (Some(config), Some(top)) = (randomness, lines.first()) else {
        return 0;
    };
    let top_cp = top.score.to_cp();
    if top_cp.abs() >= DECISIVE_EVAL_CP {
        return 0;
    }

    let weights: Vec<f64> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let weight = config.weights.get(i).copied().unwrap_or(0.0);
            if top_cp - line.score.to_cp() <= config.max_cp_loss {
                weight
            } else {
                0.0
            }
        })
        .collect();
    weighted_pick(rng, &weights).unwrap_or(0)
}

pub struct BotMoveSelector<F: EngineFactory> {
    pool: EnginePool<F>,
    base_options: EngineOptions,
}

impl<F: EngineFactory> BotMoveSelector<F> {
    pub fn new(pool: EnginePool<F>, base_options: EngineOptions) -> Self {
        Self { pool, base_options }
    }

    pub async fn select_move<R: Rng + Send + ?Sized>(
        &self,
        profile: &BotProfile,
        request: &BotMoveRequest,
        rng: &mut R,
    ) -> Result<BotMoveResponse, CoachError> {
        let mut board = GameBoard::from_optional_fen(request.initial_fen.as_deref())?;
        for (i, token) in request.moves.iter().enumerate() {
            board
                .play_token(token)
                .map_err(|e| CoachError::InvalidInput(format!("move {}: {e}", i + 1)))?;
        }
        let fen_before = board.fen();

        if let Some(reason) = board.game_over() {
            return Ok(BotMoveResponse::GameOver(GameOverResult {
                status: "game_over".into(),
                reason: reason.as_str().into(),
                fen: fen_before,
            }));
        }

        if let Some(candidate) = book_candidate(&profile.book, &request.moves, rng) {
            match board.parse_move(&candidate) {
                Ok(mv) => {
                    debug!(bot_id = %profile.id, candidate = %candidate, "Book move");
                    return Ok(BotMoveResponse::Move(BotMove {
                        mv: board.san(&mv),
                        uci: board.uci(&mv),
                        fen_after: board.after(&mv).fen(),
                        fen_before,
                        analysis: BotMoveAnalysis {
                            source: MoveSource::Book,
                            rank: None,
                            evaluation: None,
                            depth: None,
                            candidates: Vec::new(),
                        },
                    }));
                }
                Err(e) => {
                    warn!(bot_id = %profile.id, candidate = %candidate, error = %e, "Stale book move; using engine");
                }
            }
        }

        let limits = profile.search_limits();
        let output = {
            let mut engine = self.pool.acquire().await?;
            engine
                .configure(&profile.engine_options(&self.base_options))
                .await?;
            engine.analyse_position(&fen_before, &limits).await?
        };

        let index = choose_rank(&output.lines, profile.randomness.as_ref(), rng);
        let (token, rank, evaluation) = match output.lines.get(index) {
            Some(line) => (line.mv.clone(), Some(line.rank), Some(line.score.to_cp())),
            None => (output.best_move.clone(), None, Some(output.score.to_cp())),
        };
        let mv = board.parse_uci(&token).map_err(|_| {
            CoachError::EngineRuntime(format!("engine proposed illegal move {token}"))
        })?;
        info!(bot_id = %profile.id, mv = %token, rank, "Engine move");

        Ok(BotMoveResponse::Move(BotMove {
            mv: board.san(&mv),
            uci: board.uci(&mv),
            fen_after: board.after(&mv).fen(),
            fen_before,
            analysis: BotMoveAnalysis {
                source: MoveSource::Engine,
                rank,
                evaluation,
                depth: Some(output.depth),
                candidates: output.lines,
            },
        }))
    }
}
