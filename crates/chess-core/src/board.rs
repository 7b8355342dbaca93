//! Rules-aware board: FEN load/save, legal moves, notation and game-over
//! detection. Move legality lives entirely in shakmaty; this module only
//! adapts it to the string-shaped inputs the analysis layers deal with.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen, san::San, uci::UciMove, Board, CastlingMode, Chess, Color, EnPassantMode, Move,
    Piece, Position, Square,
};

use crate::error::BoardError;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

static UCI_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-h][1-8][a-h][1-8][qrbnQRBN]?$").expect("static regex"));

/// Why a position admits no further play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    NoLegalMoves,
}

impl GameOverReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameOverReason::Checkmate => "checkmate",
            GameOverReason::Stalemate => "stalemate",
            GameOverReason::InsufficientMaterial => "insufficient_material",
            GameOverReason::FiftyMoveRule => "fifty_move_rule",
            GameOverReason::NoLegalMoves => "no_legal_moves",
        }
    }
}

/// A position plus the operations the coach needs from a rules engine.
#[derive(Debug, Clone, Default)]
pub struct GameBoard {
    pos: Chess,
}

impl GameBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, BoardError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| BoardError::InvalidFen(format!("{fen}: {e}")))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| BoardError::InvalidFen(format!("{fen}: {e}")))?;
        Ok(Self { pos })
    }

    /// Board from an optional FEN, falling back to the standard start position.
    pub fn from_optional_fen(fen: Option<&str>) -> Result<Self, BoardError> {
        match fen {
            Some(f) if !f.trim().is_empty() => Self::from_fen(f),
            _ => Ok(Self::default()),
        }
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Legal).to_string()
    }

    pub fn board(&self) -> &Board {
        self.pos.board()
    }

    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.pos.board().piece_at(square)
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    /// Parse a SAN token (check/annotation suffixes tolerated) into a legal move.
    pub fn parse_san(&self, token: &str) -> Result<Move, BoardError> {
        let cleaned = token.trim().trim_end_matches(&['+', '#', '!', '?'][..]);
        let san: San = cleaned
            .parse()
            .map_err(|_| BoardError::IllegalMove(token.to_string()))?;
        san.to_move(&self.pos)
            .map_err(|_| BoardError::IllegalMove(token.to_string()))
    }

    /// Parse an engine coordinate token (e.g. `e7e8q`) into a legal move.
    pub fn parse_uci(&self, token: &str) -> Result<Move, BoardError> {
        let uci: UciMove = token
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| BoardError::IllegalMove(token.to_string()))?;
        uci.to_move(&self.pos)
            .map_err(|_| BoardError::IllegalMove(token.to_string()))
    }

    /// Accept either notation: coordinate tokens first, SAN otherwise.
    pub fn parse_move(&self, token: &str) -> Result<Move, BoardError> {
        let trimmed = token.trim();
        if UCI_TOKEN.is_match(trimmed) {
            if let Ok(mv) = self.parse_uci(trimmed) {
                return Ok(mv);
            }
        }
        self.parse_san(trimmed)
    }

    /// Apply a move previously obtained from one of the `parse_*` methods.
    pub fn play(&mut self, mv: &Move) {
        self.pos.play_unchecked(*mv);
    }

    /// Parse and apply in one step; the board is untouched on error.
    pub fn play_token(&mut self, token: &str) -> Result<Move, BoardError> {
        let mv = self.parse_move(token)?;
        self.play(&mv);
        Ok(mv)
    }

    pub fn after(&self, mv: &Move) -> GameBoard {
        let mut next = self.clone();
        next.play(mv);
        next
    }

    /// SAN including the `+`/`#` suffix.
    pub fn san(&self, mv: &Move) -> String {
        let san = San::from_move(&self.pos, *mv);
        let after = self.after(mv);
        let suffix = if after.pos.is_checkmate() {
            "#"
        } else if after.pos.is_check() {
            "+"
        } else {
            ""
        };
        format!("{san}{suffix}")
    }

    pub fn uci(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    pub fn game_over(&self) -> Option<GameOverReason> {
        if self.pos.is_checkmate() {
            Some(GameOverReason::Checkmate)
        } else if self.pos.is_stalemate() {
            Some(GameOverReason::Stalemate)
        } else if self.pos.is_insufficient_material() {
            Some(GameOverReason::InsufficientMaterial)
        } else if self.pos.halfmoves() >= 100 {
            Some(GameOverReason::FiftyMoveRule)
        } else if self.pos.legal_moves().is_empty() {
            Some(GameOverReason::NoLegalMoves)
        } else {
            None
        }
    }
}

/// Strips move counters from FEN, keeping only position + side + castling + ep.
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Side to move encoded in a FEN string, defaulting to White.
pub fn fen_turn(fen: &str) -> Color {
    match fen.split_whitespace().nth(1) {
        Some("b") => Color::Black,
        _ => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position_roundtrip() {
        let board = GameBoard::new();
        assert_eq!(board.fen(), STANDARD_START_FEN);
        assert_eq!(board.legal_moves().len(), 20);
        assert_eq!(board.game_over(), None);
    }

    #[test]
    fn test_parse_move_accepts_both_notations() {
        let board = GameBoard::new();
        let by_san = board.parse_move("Nf3").unwrap();
        let by_uci = board.parse_move("g1f3").unwrap();
        assert_eq!(by_san, by_uci);
        assert_eq!(board.uci(&by_san), "g1f3");
        assert_eq!(board.san(&by_uci), "Nf3");
    }

    #[test]
    fn test_illegal_move_rejected() {
        let board = GameBoard::new();
        assert!(matches!(board.parse_move("e2e5"), Err(BoardError::IllegalMove(_))));
        assert!(matches!(board.parse_move("Qh5"), Err(BoardError::IllegalMove(_))));
    }

    #[test]
    fn test_san_suffixes() {
        let mut board = GameBoard::new();
        for token in ["f3", "e5", "g4"] {
            board.play_token(token).unwrap();
        }
        let mate = board.parse_san("Qh4#").unwrap();
        assert_eq!(board.san(&mate), "Qh4#");
        board.play(&mate);
        assert_eq!(board.game_over(), Some(GameOverReason::Checkmate));
    }

    #[test]
    fn test_invalid_fen() {
        assert!(matches!(
            GameBoard::from_fen("not a fen"),
            Err(BoardError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_normalize_fen() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        assert_eq!(
            normalize_fen(fen),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3"
        );
    }
}
