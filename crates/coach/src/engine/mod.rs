//! UCI engine abstraction: typed scores and lines, search limits, engine
//! options, and the traits the pool and analyzers are written against.

pub mod pool;
pub mod process;
pub mod uci;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::error::CoachError;

pub use pool::{EngineLease, EnginePool};
pub use process::{EngineProcess, UciProcessFactory};

/// Magnitude every mate score collapses to in centipawn form.
pub const MATE_SCORE: i32 = 100_000;

/// Movetime used when no other `go` limit is configured.
pub const DEFAULT_MOVETIME_MS: u64 = 1000;

/// Engine score. Raw engine output is from the side to move; after
/// [`Score::for_mover`] it is from the declared mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Score {
    /// Centipawns
    Cp(i32),
    /// Mate in N moves (positive = this side mates, negative = gets mated)
    Mate(i32),
}

impl Score {
    /// The same score seen from the other side.
    pub fn flip(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }

    /// Re-express a score reported for `side_to_move` from `mover`'s side.
    pub fn for_mover(self, side_to_move: Color, mover: Color) -> Score {
        if side_to_move == mover {
            self
        } else {
            self.flip()
        }
    }

    /// Centipawns, with mate collapsed to a signed sentinel. `Mate(0)` means
    /// the side this score belongs to is already mated.
    pub fn to_cp(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }

    pub fn mate_in(self) -> Option<i32> {
        match self {
            Score::Mate(n) => Some(n),
            Score::Cp(_) => None,
        }
    }
}

/// One multipv line of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationLine {
    /// 1-based multipv rank
    pub rank: u32,
    /// First move of the line, engine coordinate notation
    #[serde(rename = "move")]
    pub mv: String,
    pub pv: Vec<String>,
    pub score: Score,
}

/// Everything one `go` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutput {
    /// Sorted by rank ascending, one entry per rank
    pub lines: Vec<EvaluationLine>,
    pub best_move: String,
    /// Rank-1 score, or `Cp(0)` if no scored line arrived
    pub score: Score,
    pub depth: u32,
    pub elapsed_ms: u64,
}

/// Limits for a single `go`. Exactly one of movetime/nodes/depth is sent, in
/// that order of preference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchLimits {
    pub movetime_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub depth: Option<u32>,
    pub multipv: u32,
    /// Wall-clock budget after which the process sends `stop`
    pub deadline: Option<Duration>,
}

impl SearchLimits {
    pub fn depth(depth: u32, multipv: u32) -> Self {
        Self {
            depth: Some(depth),
            multipv,
            ..Self::default()
        }
    }

    pub fn go_command(&self) -> String {
        if let Some(ms) = self.movetime_ms {
            format!("go movetime {ms}")
        } else if let Some(nodes) = self.nodes {
            format!("go nodes {nodes}")
        } else if let Some(depth) = self.depth {
            format!("go depth {depth}")
        } else {
            format!("go movetime {DEFAULT_MOVETIME_MS}")
        }
    }
}

/// Strength and resource options applied with `setoption`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
    pub skill_level: Option<u8>,
    /// Setting this enables `UCI_LimitStrength`
    pub elo: Option<u32>,
    pub contempt: Option<i32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 64,
            skill_level: None,
            elo: None,
            contempt: None,
        }
    }
}

impl EngineOptions {
    /// `(name, value)` pairs in the order they should be sent. Unset strength
    /// limits map to the engine's full-strength values so a reconfigured
    /// worker does not keep a previous consumer's handicap.
    pub fn uci_options(&self) -> Vec<(&'static str, String)> {
        let mut options = vec![
            ("Threads", self.threads.max(1).to_string()),
            ("Hash", self.hash_mb.max(1).to_string()),
            ("Skill Level", self.skill_level.unwrap_or(20).to_string()),
            ("UCI_LimitStrength", self.elo.is_some().to_string()),
        ];
        if let Some(elo) = self.elo {
            options.push(("UCI_Elo", elo.to_string()));
        }
        if let Some(contempt) = self.contempt {
            options.push(("Contempt", contempt.to_string()));
        }
        options
    }
}

/// One engine instance. Exactly one analysis may run at a time; callers
/// serialize through [`EnginePool`].
#[async_trait]
pub trait UciEngine: Send + 'static {
    fn id(&self) -> usize;

    /// Name from `id name`, or a fallback.
    fn name(&self) -> &str;

    /// Whether the underlying process is still usable.
    fn is_alive(&mut self) -> bool;

    /// Apply options, sending only what changed since the last call.
    async fn configure(&mut self, options: &EngineOptions) -> Result<(), CoachError>;

    async fn analyse_position(
        &mut self,
        fen: &str,
        limits: &SearchLimits,
    ) -> Result<AnalysisOutput, CoachError>;

    /// Shut down; errors are swallowed.
    async fn dispose(&mut self);
}

/// Creates ready-to-use engines for the pool (initial fill and replacements).
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: UciEngine;

    async fn spawn(&self, id: usize) -> Result<Self::Engine, CoachError>;
}
