//! Error types for gtkwave-embed.

use std::time::Duration;

use crate::process::ProcessState;

/// Result type alias using GtkwaveError.
pub type Result<T> = std::result::Result<T, GtkwaveError>;

/// Errors that can occur while embedding a waveform screenshot.
#[derive(Debug, thiserror::Error)]
pub enum GtkwaveError {
    /// Filesystem or pipe I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No accepted frame showed up before the timeout.
    #[error("Timeout after {timeout:?} waiting for an accepted screenshot of {process}")]
    CaptureTimeout {
        /// How long we polled.
        timeout: Duration,
        /// The viewer process at the time of the timeout.
        process: Box<ProcessState>,
    },

    /// An internal assumption did not hold.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Failed to spawn an external command.
    #[error("Failed to spawn command: {0}")]
    SpawnFailed(String),

    /// The virtual display could not be started or queried.
    #[error("Display error: {0}")]
    Display(String),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid directive argument or option.
    #[error("Directive error in {directive}: {message}")]
    Directive {
        /// Name of the directive being parsed.
        directive: String,
        /// What was wrong with it.
        message: String,
    },

    /// Invalid settings file.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GtkwaveError {
    pub(crate) fn directive(directive: &str, message: impl Into<String>) -> Self {
        GtkwaveError::Directive {
            directive: directive.to_string(),
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for GtkwaveError {
    fn from(err: image::ImageError) -> Self {
        GtkwaveError::Image(err.to_string())
    }
}
