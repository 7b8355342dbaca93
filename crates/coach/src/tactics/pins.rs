/// Pin detector: ray-casts from the mover's king
use chess_core::material::{color_name, piece_value, role_name};
use chess_core::shakmaty::{Color, Role, Square};
use chess_core::GameBoard;
use serde_json::json;

use super::{DetectedPattern, PatternId, PatternThresholds, Severity};

const ROOK_DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

fn offset(sq: Square, df: i32, dr: i32) -> Option<Square> {
    let file = sq.file() as i32 + df;
    let rank = sq.rank() as i32 + dr;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some(Square::new((rank * 8 + file) as u32))
    } else {
        None
    }
}

/// First two occupied squares along a ray, exclusive of `from`.
fn first_two_on_ray(board: &GameBoard, from: Square, df: i32, dr: i32) -> (Option<Square>, Option<Square>) {
    let mut found = (None, None);
    let mut cur = from;
    while let Some(next) = offset(cur, df, dr) {
        cur = next;
        if board.piece_at(cur).is_some() {
            if found.0.is_none() {
                found.0 = Some(cur);
            } else {
                found.1 = Some(cur);
                break;
            }
        }
    }
    found
}

/// Most valuable mover piece pinned to its own king in `after`.
pub fn pin(
    after: &GameBoard,
    mover: Color,
    thresholds: &PatternThresholds,
) -> Option<DetectedPattern> {
    let board = after.board();
    let king = board
        .by_color(mover)
        .into_iter()
        .find(|sq| board.piece_at(*sq).map(|p| p.role) == Some(Role::King))?;

    let rays = ROOK_DIRS
        .iter()
        .map(|d| (*d, [Role::Rook, Role::Queen]))
        .chain(BISHOP_DIRS.iter().map(|d| (*d, [Role::Bishop, Role::Queen])));

    let mut best: Option<(Square, Role, Square, Role)> = None;
    for ((df, dr), sliders) in rays {
        let (Some(first), Some(second)) = first_two_on_ray(after, king, df, dr) else {
            continue;
        };
        let (Some(pinned), Some(pinner)) = (board.piece_at(first), board.piece_at(second)) else {
            continue;
        };
        if pinned.color != mover || pinner.color == mover || !sliders.contains(&pinner.role) {
            continue;
        }
        if best.map_or(true, |(_, role, _, _)| piece_value(pinned.role) > piece_value(role)) {
            best = Some((first, pinned.role, second, pinner.role));
        }
    }

    let (square, role, pinner_sq, pinner_role) = best?;
    let value = piece_value(role);
    let severity = if value >= thresholds.pin_critical_value {
        Severity::Critical
    } else if value >= thresholds.pin_warning_value {
        Severity::Warning
    } else {
        Severity::Info
    };
    Some(DetectedPattern {
        id: PatternId::Pin,
        severity,
        data: json!({
            "square": square.to_string(),
            "piece": role_name(role),
            "color": color_name(mover),
            "kingSquare": king.to_string(),
            "pinner": {
                "square": pinner_sq.to_string(),
                "piece": role_name(pinner_role),
                "color": color_name(!mover),
            },
        }),
    })
}
