//! Coach error taxonomy

use chess_core::BoardError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoachError {
    /// Handshake failed or the process could not be started.
    #[error("Engine init error: {0}")]
    EngineInit(String),

    /// The process died or misbehaved while serving a request.
    #[error("Engine runtime error: {0}")]
    EngineRuntime(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Engine pool is closed")]
    PoolClosed,

    #[error("Delegated review failed: {0}")]
    Delegate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BoardError> for CoachError {
    fn from(e: BoardError) -> Self {
        CoachError::InvalidInput(e.to_string())
    }
}
