use serde::{Deserialize, Serialize};

/// PGN headers echoed back with a review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub event: Option<String>,
    pub white_elo: Option<i32>,
    pub black_elo: Option<i32>,
}

/// A parsed game: headers, optional non-standard start and the SAN movetext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecord {
    pub metadata: GameMetadata,
    /// Start position from a `FEN` header, `None` for the standard start.
    pub start_fen: Option<String>,
    pub moves: Vec<String>, // SAN notation
}
