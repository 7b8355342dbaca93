/// Attack detectors: hanging_piece, fork_threat
use chess_core::material::{color_name, piece_value, role_name};
use chess_core::shakmaty::{attacks::knight_attacks, Color, Role, Square};
use chess_core::GameBoard;
use serde_json::json;

use super::{DetectedPattern, PatternId, PatternThresholds, Severity};

/// A mover piece the opponent can take without the mover taking back.
/// `after` has the opponent to move. Reports the most valuable such piece.
pub fn hanging_piece(
    after: &GameBoard,
    mover: Color,
    thresholds: &PatternThresholds,
) -> Option<DetectedPattern> {
    let mut checked: Vec<Square> = Vec::new();
    let mut worst: Option<(Square, Role, i32)> = None;

    for capture in after.legal_moves() {
        if capture.is_en_passant() {
            continue;
        }
        let Some(role) = capture.capture() else {
            continue;
        };
        let square = capture.to();
        if checked.contains(&square) {
            continue;
        }
        checked.push(square);

        let value = piece_value(role);
        if value <= 0 {
            continue;
        }
        let next = after.after(&capture);
        let recapture = next
            .legal_moves()
            .iter()
            .any(|m| m.to() == square && m.is_capture());
        if recapture {
            continue;
        }
        if worst.map_or(true, |(_, _, v)| value > v) {
            worst = Some((square, role, value));
        }
    }

    let (square, role, value) = worst?;
    let severity = if value >= thresholds.hanging_critical_value {
        Severity::Critical
    } else {
        Severity::Warning
    };
    Some(DetectedPattern {
        id: PatternId::HangingPiece,
        severity,
        data: json!({
            "square": square.to_string(),
            "piece": role_name(role),
            "color": color_name(mover),
            "value": value,
        }),
    })
}

/// An opponent knight attacking two or more valuable mover pieces.
pub fn fork_threat(
    after: &GameBoard,
    mover: Color,
    thresholds: &PatternThresholds,
) -> Option<DetectedPattern> {
    let board = after.board();
    let mut best: Option<DetectedPattern> = None;

    for knight_sq in board.by_color(!mover) {
        if board.piece_at(knight_sq).map(|p| p.role) != Some(Role::Knight) {
            continue;
        }
        let targets: Vec<(Square, Role)> = (knight_attacks(knight_sq) & board.by_color(mover))
            .into_iter()
            .filter_map(|sq| board.piece_at(sq).map(|p| (sq, p.role)))
            .filter(|(_, role)| {
                *role == Role::King || piece_value(*role) >= thresholds.fork_min_target_value
            })
            .collect();
        if targets.len() < 2 {
            continue;
        }

        let critical = targets.iter().any(|(_, role)| {
            matches!(role, Role::Queen | Role::King)
                || piece_value(*role) >= thresholds.fork_critical_value
        });
        let severity = if critical {
            Severity::Critical
        } else {
            Severity::Warning
        };
        if best.as_ref().is_some_and(|b| b.severity >= severity) {
            continue;
        }
        best = Some(DetectedPattern {
            id: PatternId::ForkThreat,
            severity,
            data: json!({
                "square": knight_sq.to_string(),
                "piece": role_name(Role::Knight),
                "color": color_name(!mover),
                "targets": targets
                    .iter()
                    .map(|(sq, role)| json!({
                        "square": sq.to_string(),
                        "piece": role_name(*role),
                        "color": color_name(mover),
                    }))
                    .collect::<Vec<_>>(),
            }),
        });
    }
    best
}
