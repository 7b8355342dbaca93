//! Before/after evaluation of a single move.

use chess_core::shakmaty::{Color, Move};
use chess_core::{GameBoard, GameOverReason};
use tracing::warn;

use crate::engine::{AnalysisOutput, EvaluationLine, Score, SearchLimits, UciEngine};
use crate::error::CoachError;

/// Engine view of one played move, every score from the mover's side.
#[derive(Debug, Clone)]
pub struct MoveEvaluation {
    pub fen_before: String,
    pub fen_after: String,
    pub played_uci: String,
    pub played_san: String,
    /// Wide analysis of the position before the move
    pub before_lines: Vec<EvaluationLine>,
    /// Narrow analysis of the reply position (empty when the game ended)
    pub after_lines: Vec<EvaluationLine>,
    pub best_before: Score,
    pub best_after: Score,
    pub eval_before: i32,
    pub eval_after: i32,
    pub best_move_uci: String,
    pub best_move_san: String,
    /// Rank-1 line before the move, in SAN
    pub pv_san: Vec<String>,
    pub depth: u32,
}

impl MoveEvaluation {
    /// `eval_after - eval_before`; negative means the move lost ground.
    pub fn delta(&self) -> i32 {
        self.eval_after - self.eval_before
    }

    /// First move of the engine's expected reply, coordinate notation.
    pub fn expected_reply(&self) -> Option<&str> {
        self.after_lines.first().map(|l| l.mv.as_str())
    }
}

pub struct PositionAnalyzer {
    pub before_limits: SearchLimits,
    pub after_limits: SearchLimits,
}

impl PositionAnalyzer {
    pub fn new(depth: u32, multipv: u32) -> Self {
        Self {
            before_limits: SearchLimits::depth(depth, multipv.max(1)),
            after_limits: SearchLimits::depth(depth, 1),
        }
    }

    /// Evaluate `board` before and after `mv`. The board must have `mover`
    /// to move.
    pub async fn analyse_move<E: UciEngine + ?Sized>(
        &self,
        engine: &mut E,
        board: &GameBoard,
        mv: &Move,
    ) -> Result<MoveEvaluation, CoachError> {
        let mover = board.turn();
        let fen_before = board.fen();
        let after = board.after(mv);
        let fen_after = after.fen();

        let before = engine.analyse_position(&fen_before, &self.before_limits).await?;
        let before_lines = normalize_lines(&before.lines, mover, mover);
        let best_before = before.score.for_mover(mover, mover);

        let (after_lines, best_after, after_depth) = match after.game_over() {
            Some(GameOverReason::Checkmate) => (Vec::new(), Score::Mate(1), 0),
            Some(_) => (Vec::new(), Score::Cp(0), 0),
            None => {
                let reply: AnalysisOutput =
                    engine.analyse_position(&fen_after, &self.after_limits).await?;
                (
                    normalize_lines(&reply.lines, after.turn(), mover),
                    reply.score.for_mover(after.turn(), mover),
                    reply.depth,
                )
            }
        };

        let best_move_san = match board.parse_uci(&before.best_move) {
            Ok(best) => board.san(&best),
            Err(_) => {
                warn!(token = %before.best_move, fen = %fen_before, "Unresolved best move; keeping raw token");
                before.best_move.clone()
            }
        };
        let pv_san = before
            .lines
            .first()
            .map(|l| resolve_pv(board, &l.pv))
            .unwrap_or_default();

        Ok(MoveEvaluation {
            played_uci: board.uci(mv),
            played_san: board.san(mv),
            fen_before,
            fen_after,
            before_lines,
            after_lines,
            best_before,
            best_after,
            eval_before: best_before.to_cp(),
            eval_after: best_after.to_cp(),
            best_move_uci: before.best_move,
            best_move_san,
            pv_san,
            depth: before.depth.max(after_depth),
        })
    }
}

fn normalize_lines(
    lines: &[EvaluationLine],
    side_to_move: Color,
    mover: Color,
) -> Vec<EvaluationLine> {
    lines
        .iter()
        .map(|l| EvaluationLine {
            score: l.score.for_mover(side_to_move, mover),
            ..l.clone()
        })
        .collect()
}

/// Replay coordinate tokens and render them in SAN. From the first token
/// that does not resolve, the remaining tokens are kept raw.
pub fn resolve_pv(board: &GameBoard, tokens: &[String]) -> Vec<String> {
    let mut replay = board.clone();
    let mut out = Vec::with_capacity(tokens.len());
    for (i, token) in tokens.iter().enumerate() {
        match replay.parse_uci(token) {
            Ok(mv) => {
                out.push(replay.san(&mv));
                replay.play(&mv);
            }
            Err(_) => {
                warn!(token = %token, fen = %replay.fen(), "Unresolved PV token; keeping raw tail");
                out.extend(tokens[i..].iter().cloned());
                break;
            }
        }
    }
    out
}
