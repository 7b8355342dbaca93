/// Tactical motif detectors run on every reviewed move.
/// Each detector is a pure function of the positions around the move.
pub mod attacks;
pub mod mates;
pub mod material;
pub mod pins;

use chess_core::shakmaty::Color;
use chess_core::GameBoard;
use serde::{Deserialize, Serialize};

use crate::engine::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternId {
    MissedMate,
    MateThreat,
    HangingPiece,
    MaterialDrop,
    ForkThreat,
    Pin,
}

impl PatternId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternId::MissedMate => "missed-mate",
            PatternId::MateThreat => "mate-threat",
            PatternId::HangingPiece => "hanging-piece",
            PatternId::MaterialDrop => "material-drop",
            PatternId::ForkThreat => "fork-threat",
            PatternId::Pin => "pin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub id: PatternId,
    pub severity: Severity,
    pub data: serde_json::Value,
}

/// Cutoffs for every detector. Defaults match full-strength review.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternThresholds {
    /// Hanging piece value at which the finding is critical
    pub hanging_critical_value: i32,
    /// Net material loss (points) that is critical on its own
    pub material_drop_critical: f64,
    /// Net material loss that is a warning when the eval also drops
    pub material_drop_warning: f64,
    /// Eval drop (cp) that must accompany a warning-level material loss
    pub material_drop_eval_cp: i32,
    /// Minimum value for a fork target (kings always count)
    pub fork_min_target_value: i32,
    /// Target value at which a fork is critical
    pub fork_critical_value: i32,
    /// Pinned piece value at which a pin is critical
    pub pin_critical_value: i32,
    /// Pinned piece value at which a pin is a warning; below it, info
    pub pin_warning_value: i32,
    pub missed_mate_critical_distance: i32,
    pub mate_threat_critical_distance: i32,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            hanging_critical_value: 3,
            material_drop_critical: 3.0,
            material_drop_warning: 1.5,
            material_drop_eval_cp: 100,
            fork_min_target_value: 3,
            fork_critical_value: 5,
            pin_critical_value: 5,
            pin_warning_value: 3,
            missed_mate_critical_distance: 2,
            mate_threat_critical_distance: 3,
        }
    }
}

/// Positions and engine scores around one move, scores from the mover's side.
pub struct PatternContext<'a> {
    pub mover: Color,
    pub before: &'a GameBoard,
    pub after: &'a GameBoard,
    /// Position after the engine's expected reply, when there is one
    pub after_reply: Option<&'a GameBoard>,
    pub best_before: Score,
    pub best_after: Score,
    /// `eval_before - eval_after`; positive when the move lost ground
    pub eval_drop_cp: i32,
}

/// Run every detector; all findings are returned together.
pub fn detect_patterns(ctx: &PatternContext, thresholds: &PatternThresholds) -> Vec<DetectedPattern> {
    [
        mates::missed_mate(ctx, thresholds),
        mates::mate_threat(ctx, thresholds),
        attacks::hanging_piece(ctx.after, ctx.mover, thresholds),
        material::material_drop(ctx, thresholds),
        attacks::fork_threat(ctx.after, ctx.mover, thresholds),
        pins::pin(ctx.after, ctx.mover, thresholds),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// The finding a coach message should be about: highest severity, ties
/// broken by pattern order (mates first).
pub fn dominant(patterns: &[DetectedPattern]) -> Option<&DetectedPattern> {
    patterns
        .iter()
        .min_by_key(|p| (std::cmp::Reverse(p.severity), p.id))
}
