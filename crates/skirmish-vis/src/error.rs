//! Error types for the replay viewer backend.

use thiserror::Error;

/// Viewer errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("replay error: {0}")]
    Replay(#[from] skirmish_replay::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;
