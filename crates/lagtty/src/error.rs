//! Error types for the session orchestrator.

use lagtty_shaper::ShaperError;

/// Errors that can occur while setting up or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("shaper error: {0}")]
    Shaper(#[from] ShaperError),
}
