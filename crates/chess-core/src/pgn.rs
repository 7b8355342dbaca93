//! PGN parsing utilities: a lightweight regex-based parser.
//!
//! Movetext is validated token by token so malformed input is rejected up
//! front; move legality is checked later when the moves are replayed.

use std::sync::LazyLock;

use regex::Regex;

use crate::board::STANDARD_START_FEN;
use crate::error::BoardError;
use crate::game_data::{GameMetadata, GameRecord};

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("static regex"));
static HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("static regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}|;[^\n]*").expect("static regex"));
static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.+").expect("static regex"));
static SAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[QRBN])?|O-O-O|O-O|0-0-0|0-0)[+#]?[!?]*$")
        .expect("static regex")
});

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Parse a PGN string into a GameRecord.
///
/// An empty movetext is a valid (empty) game; any token that is neither a
/// move number, a result, a NAG nor a SAN move makes the whole PGN invalid.
pub fn parse_pgn(pgn: &str) -> Result<GameRecord, BoardError> {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..GameMetadata::default()
    };
    let mut setup = None;
    let mut fen = None;

    for cap in HEADER_RE.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Date" => metadata.date = Some(value),
            "Event" => metadata.event = Some(value),
            "WhiteElo" => metadata.white_elo = value.parse().ok(),
            "BlackElo" => metadata.black_elo = value.parse().ok(),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // A FEN header only counts when it differs from the standard start.
    let start_fen = match (setup.as_deref(), fen) {
        (Some("0"), _) => None,
        (_, Some(f)) if f.trim() != STANDARD_START_FEN => Some(f.trim().to_string()),
        _ => None,
    };

    let moves = extract_moves(pgn)?;

    Ok(GameRecord {
        metadata,
        start_fen,
        moves,
    })
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
fn extract_moves(pgn: &str) -> Result<Vec<String>, BoardError> {
    let no_headers = HEADER_LINE_RE.replace_all(pgn, "");
    let no_comments = COMMENT_RE.replace_all(&no_headers, " ");
    let movetext = strip_variations(&no_comments)?;

    let mut moves = Vec::new();
    for raw in movetext.split_whitespace() {
        let token = MOVE_NUMBER_RE.replace(raw, "");
        let token = token.trim();
        if token.is_empty() || token.starts_with('$') || RESULT_TOKENS.contains(&token) {
            continue;
        }
        if !SAN_RE.is_match(token) {
            return Err(BoardError::InvalidPgn(format!("unexpected token '{token}'")));
        }
        moves.push(token.replace("0-0-0", "O-O-O").replace("0-0", "O-O"));
    }
    Ok(moves)
}

/// Remove (possibly nested) parenthesised variations.
fn strip_variations(text: &str) -> Result<String, BoardError> {
    let mut depth = 0usize;
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| BoardError::InvalidPgn("unbalanced ')'".into()))?;
                out.push(' ');
            }
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(BoardError::InvalidPgn("unterminated variation".into()));
    }
    Ok(out)
}
