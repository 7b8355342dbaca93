/// Mate detectors: missed_mate, mate_threat
use serde_json::json;

use super::{DetectedPattern, PatternContext, PatternId, PatternThresholds, Severity};

/// The mover had a forced mate before the move and no longer has one.
pub fn missed_mate(ctx: &PatternContext, thresholds: &PatternThresholds) -> Option<DetectedPattern> {
    let distance = ctx.best_before.mate_in().filter(|n| *n > 0)?;
    if ctx.best_after.mate_in().is_some_and(|n| n > 0) {
        return None;
    }
    let severity = if distance <= thresholds.missed_mate_critical_distance {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(DetectedPattern {
        id: PatternId::MissedMate,
        severity,
        data: json!({ "mate": distance }),
    })
}

/// The opponent's best reply is a forced mate against the mover.
pub fn mate_threat(ctx: &PatternContext, thresholds: &PatternThresholds) -> Option<DetectedPattern> {
    let distance = -ctx.best_after.mate_in().filter(|n| *n < 0)?;
    let severity = if distance <= thresholds.mate_threat_critical_distance {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(DetectedPattern {
        id: PatternId::MateThreat,
        severity,
        data: json!({ "mate": distance }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Score;
    use chess_core::shakmaty::Color;
    use chess_core::GameBoard;

    fn ctx<'a>(board: &'a GameBoard, before: Score, after: Score) -> PatternContext<'a> {
        PatternContext {
            mover: Color::White,
            before: board,
            after: board,
            after_reply: None,
            best_before: before,
            best_after: after,
            eval_drop_cp: 0,
        }
    }

    #[test]
    fn test_missed_mate() {
        let board = GameBoard::new();
        let t = PatternThresholds::default();
        let found = missed_mate(&ctx(&board, Score::Mate(2), Score::Cp(300)), &t).unwrap();
        assert_eq!(found.severity, Severity::Critical);
        assert_eq!(found.data["mate"], 2);

        let far = missed_mate(&ctx(&board, Score::Mate(5), Score::Cp(300)), &t).unwrap();
        assert_eq!(far.severity, Severity::Warning);

        // Still mating, just slower: not missed.
        assert!(missed_mate(&ctx(&board, Score::Mate(2), Score::Mate(4)), &t).is_none());
    }

    #[test]
    fn test_mate_threat() {
        let board = GameBoard::new();
        let t = PatternThresholds::default();
        let found = mate_threat(&ctx(&board, Score::Cp(0), Score::Mate(-1)), &t).unwrap();
        assert_eq!(found.severity, Severity::Critical);
        assert_eq!(found.data["mate"], 1);
        assert!(mate_threat(&ctx(&board, Score::Cp(0), Score::Mate(3)), &t).is_none());
        assert!(mate_threat(&ctx(&board, Score::Cp(0), Score::Cp(-800)), &t).is_none());
    }
}
