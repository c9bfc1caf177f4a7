//! Error types shared across Fallwatch crates.

use std::path::PathBuf;

/// Top-level error type for Fallwatch operations.
///
/// No variant is fatal to the frame loop: callers log and move on to the
/// next frame.
#[derive(Debug, thiserror::Error)]
pub enum FallwatchError {
    /// The landmark set for a frame is malformed (missing indices,
    /// non-finite coordinates, zero frame size). The frame is skipped.
    #[error("Input error: {message}")]
    Input { message: String },

    #[error("Evidence error: {message}")]
    Evidence { message: String },

    #[error("Dispatch error: {message}")]
    Dispatch { message: String },

    #[error("Notification error: {message}")]
    Notification { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FallwatchError.
pub type FallwatchResult<T> = Result<T, FallwatchError>;

impl FallwatchError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn evidence(msg: impl Into<String>) -> Self {
        Self::Evidence {
            message: msg.into(),
        }
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch {
            message: msg.into(),
        }
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error only affects the current frame.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input { .. })
    }
}
