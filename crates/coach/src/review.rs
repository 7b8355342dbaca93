//! Full-game review: per-ply evaluation, tactics, classification, coaching,
//! and accuracy. Short games run on the local engine pool; long ones go to a
//! batch pipeline with the same request/response contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chess_core::material::color_name;
use chess_core::pgn::parse_pgn;
use chess_core::shakmaty::{Color, Move};
use chess_core::{GameBoard, GameMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::PositionAnalyzer;
use crate::classify::{accuracy, classify, ClassifyInput, MoveTag, ThresholdTable};
use crate::coach::coach_message;
use crate::engine::{EngineFactory, EngineOptions, EnginePool, UciEngine};
use crate::error::CoachError;
use crate::tactics::material::material_lost;
use crate::tactics::{detect_patterns, DetectedPattern, PatternContext, PatternThresholds};

const MAX_REVIEW_DEPTH: u32 = 40;
const MAX_MULTIPV: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    Auto,
    Local,
    Server,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub pgn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_pv: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_for_elo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_mode: Option<ReviewMode>,
}

impl ReviewRequest {
    pub fn new(pgn: impl Into<String>) -> Self {
        Self {
            pgn: pgn.into(),
            depth: None,
            multi_pv: None,
            accuracy_for_elo: None,
            review_mode: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAnalysis {
    pub ply: usize,
    pub san: String,
    pub color: String,
    pub fen_before: String,
    pub fen_after: String,
    pub eval_before: i32,
    pub eval_after: i32,
    /// Engine's preferred move, SAN when it resolves
    pub best_move: String,
    /// Engine's main line from the position before the move, SAN
    pub pv: Vec<String>,
    pub delta: i32,
    pub tag: MoveTag,
    pub patterns: Vec<DetectedPattern>,
    pub coach_message: String,
    /// Only one legal move was available
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub white_accuracy: f64,
    pub black_accuracy: f64,
    pub tags: BTreeMap<String, u32>,
    pub patterns: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub moves: Vec<MoveAnalysis>,
    pub accuracy: f64,
    pub summary: ReviewSummary,
    pub engine: String,
    pub depth: u32,
    /// Headers of the reviewed game
    #[serde(default)]
    pub game: GameMetadata,
}

/// Remote pipeline that reviews games with the same contract.
#[async_trait]
pub trait BatchReviewer: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, CoachError>;
}

#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub depth: u32,
    pub multipv: u32,
    /// Games with at most this many plies run locally in auto mode
    pub local_ply_threshold: usize,
    pub engine_options: EngineOptions,
    pub thresholds: ThresholdTable,
    pub patterns: PatternThresholds,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            depth: 16,
            multipv: 3,
            local_ply_threshold: 80,
            engine_options: EngineOptions::default(),
            thresholds: ThresholdTable::default(),
            patterns: PatternThresholds::default(),
        }
    }
}

pub struct GameReviewer<F: EngineFactory> {
    pool: EnginePool<F>,
    delegate: Option<Arc<dyn BatchReviewer>>,
    settings: ReviewSettings,
}

impl<F: EngineFactory> GameReviewer<F> {
    pub fn new(pool: EnginePool<F>, settings: ReviewSettings) -> Self {
        Self {
            pool,
            delegate: None,
            settings,
        }
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn BatchReviewer>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    /// Local or Server. An explicit request wins; auto goes by game length.
    pub fn select_mode(&self, requested: Option<ReviewMode>, ply_count: usize) -> ReviewMode {
        match requested {
            Some(ReviewMode::Local) => ReviewMode::Local,
            Some(ReviewMode::Server) => ReviewMode::Server,
            Some(ReviewMode::Auto) | None => {
                if ply_count <= self.settings.local_ply_threshold {
                    ReviewMode::Local
                } else {
                    ReviewMode::Server
                }
            }
        }
    }

    /// Review a whole game. Any invalid input fails the whole review before
    /// an engine is touched.
    pub async fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, CoachError> {
        let record = parse_pgn(&request.pgn)?;
        let plies = replay(record.start_fen.as_deref(), &record.moves)?;

        let explicit = matches!(request.review_mode, Some(ReviewMode::Server));
        if self.select_mode(request.review_mode, plies.len()) == ReviewMode::Server {
            match &self.delegate {
                Some(delegate) => {
                    info!(plies = plies.len(), "Delegating review to batch pipeline");
                    let mut forwarded = request.clone();
                    forwarded.review_mode = Some(ReviewMode::Local);
                    return delegate.review(&forwarded).await;
                }
                None if explicit => {
                    return Err(CoachError::InvalidInput(
                        "server review mode is not configured".into(),
                    ))
                }
                None => {
                    info!(plies = plies.len(), "No batch pipeline configured; reviewing locally");
                }
            }
        }

        let mut response = self.review_local(request, &plies).await?;
        response.game = record.metadata;
        Ok(response)
    }

    async fn review_local(
        &self,
        request: &ReviewRequest,
        plies: &[(GameBoard, Move)],
    ) -> Result<ReviewResponse, CoachError> {
        let depth = request
            .depth
            .unwrap_or(self.settings.depth)
            .clamp(1, MAX_REVIEW_DEPTH);
        let multipv = request
            .multi_pv
            .unwrap_or(self.settings.multipv)
            .clamp(1, MAX_MULTIPV);

        if plies.is_empty() {
            return Ok(build_response(Vec::new(), String::new(), depth));
        }

        let analyzer = PositionAnalyzer::new(depth, multipv);
        let mut engine = self.pool.acquire().await?;
        engine.configure(&self.settings.engine_options).await?;

        let mut moves = Vec::with_capacity(plies.len());
        for (i, (board, mv)) in plies.iter().enumerate() {
            let analysis = self
                .review_ply(&mut *engine, &analyzer, i + 1, board, mv, request.accuracy_for_elo)
                .await?;
            moves.push(analysis);
        }
        let engine_name = engine.name().to_string();
        drop(engine);

        let response = build_response(moves, engine_name, depth);
        info!(
            plies = response.moves.len(),
            accuracy = response.accuracy,
            "Review complete"
        );
        Ok(response)
    }

    async fn review_ply<E: UciEngine + ?Sized>(
        &self,
        engine: &mut E,
        analyzer: &PositionAnalyzer,
        ply: usize,
        board: &GameBoard,
        mv: &Move,
        elo: Option<u32>,
    ) -> Result<MoveAnalysis, CoachError> {
        let mover = board.turn();
        let eval = analyzer.analyse_move(engine, board, mv).await?;
        let after = board.after(mv);
        let reply_board = eval.expected_reply().and_then(|token| match after.parse_uci(token) {
            Ok(reply) => Some(after.after(&reply)),
            Err(_) => {
                warn!(ply, token, "Unresolved expected reply; skipping it");
                None
            }
        });

        let ctx = PatternContext {
            mover,
            before: board,
            after: &after,
            after_reply: reply_board.as_ref(),
            best_before: eval.best_before,
            best_after: eval.best_after,
            eval_drop_cp: eval.eval_before - eval.eval_after,
        };
        let patterns = detect_patterns(&ctx, &self.settings.patterns);
        let tag = classify(
            &ClassifyInput {
                delta_cp: eval.delta(),
                elo,
                played_uci: &eval.played_uci,
                lines: &eval.before_lines,
                eval_before_cp: eval.eval_before,
                eval_after_cp: eval.eval_after,
                sacrificed: material_lost(&ctx).max(0),
            },
            &self.settings.thresholds,
        );
        let played_is_best = eval.played_uci == eval.best_move_uci;
        let message = coach_message(tag, &patterns, Some(&eval.best_move_san), played_is_best);
        debug!(ply, san = %eval.played_san, tag = tag.as_str(), delta = eval.delta(), "Reviewed ply");

        Ok(MoveAnalysis {
            ply,
            san: eval.played_san.clone(),
            color: color_name(mover).to_string(),
            delta: eval.delta(),
            fen_before: eval.fen_before,
            fen_after: eval.fen_after,
            eval_before: eval.eval_before,
            eval_after: eval.eval_after,
            best_move: eval.best_move_san,
            pv: eval.pv_san,
            tag,
            patterns,
            coach_message: message,
            forced: board.legal_moves().len() == 1,
        })
    }
}

/// Boards before each ply, paired with the move played from them.
fn replay(start_fen: Option<&str>, tokens: &[String]) -> Result<Vec<(GameBoard, Move)>, CoachError> {
    let mut board = GameBoard::from_optional_fen(start_fen)?;
    let mut plies = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        let mv = board
            .parse_move(token)
            .map_err(|e| CoachError::InvalidInput(format!("ply {}: {e}", i + 1)))?;
        let next = board.after(&mv);
        plies.push((board, mv));
        board = next;
    }
    Ok(plies)
}

fn build_response(moves: Vec<MoveAnalysis>, engine: String, depth: u32) -> ReviewResponse {
    let deltas = |side: Option<&str>| -> Vec<i32> {
        moves
            .iter()
            .filter(|m| side.map_or(true, |s| m.color == s))
            .map(|m| m.delta)
            .collect()
    };
    let white = color_name(Color::White);
    let black = color_name(Color::Black);

    let mut tags = BTreeMap::new();
    let mut patterns = BTreeMap::new();
    for m in &moves {
        *tags.entry(m.tag.as_str().to_string()).or_insert(0) += 1;
        for p in &m.patterns {
            *patterns.entry(p.id.as_str().to_string()).or_insert(0) += 1;
        }
    }

    ReviewResponse {
        accuracy: accuracy(&deltas(None)),
        summary: ReviewSummary {
            white_accuracy: accuracy(&deltas(Some(white))),
            black_accuracy: accuracy(&deltas(Some(black))),
            tags,
            patterns,
        },
        moves,
        engine,
        depth,
        game: GameMetadata::default(),
    }
}
