//! Error types for skirmish-replay.

use thiserror::Error;

/// Result type for skirmish-replay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the edges of the replay engine.
///
/// The engine itself never fails: stalls, empty recordings and
/// unreachable seek targets all settle into ordinary phases.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine task has exited and no longer accepts messages.
    #[error("replay engine has stopped")]
    EngineStopped,
}
