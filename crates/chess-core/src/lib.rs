pub use shakmaty;

pub mod board;
pub mod error;
pub mod game_data;
pub mod material;
pub mod pgn;

pub use board::{GameBoard, GameOverReason, STANDARD_START_FEN};
pub use error::BoardError;
pub use game_data::{GameMetadata, GameRecord};
