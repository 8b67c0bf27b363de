use std::path::PathBuf;

use crate::foundation::core::Azimuth;

/// Result alias used across the crate.
pub type SweepResult<T> = Result<T, SweepError>;

/// Top-level error for every pipeline stage.
#[derive(thiserror::Error, Debug)]
pub enum SweepError {
    /// Invalid inputs or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// A persisted embedding exists but cannot be trusted.
    #[error("cache corruption at '{}': {reason}", path.display())]
    CacheCorruption {
        /// Artifact path that failed to load.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The dimensionality-reduction collaborator failed.
    #[error("reduction error: {0}")]
    Reduce(String),

    /// A single frame failed to render.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Frames are missing on disk where a full sweep was expected.
    #[error(
        "incomplete frame sequence in '{}': {found} of {expected} frames present (first missing azimuth {first_missing})",
        folder.display()
    )]
    IncompleteSequence {
        /// Folder that was scanned.
        folder: PathBuf,
        /// Number of frames a complete sweep has.
        expected: usize,
        /// Number of frames actually present.
        found: usize,
        /// Lowest missing azimuth in degrees.
        first_missing: u16,
    },

    /// The external encoder failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SweepError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn reduce(msg: impl Into<String>) -> Self {
        Self::Reduce(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn cache_corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CacheCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors that need operator intervention rather than a retry.
    pub fn is_cache_corruption(&self) -> bool {
        matches!(self, Self::CacheCorruption { .. })
    }
}

/// Failure to render the frame for one azimuth.
///
/// Always carries the azimuth so aggregated failures can be traced back to their frame.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("render error at azimuth {azimuth}: {message}")]
pub struct RenderError {
    /// Azimuth of the failed frame.
    pub azimuth: Azimuth,
    /// Backend diagnostic.
    pub message: String,
}

impl RenderError {
    pub fn new(azimuth: Azimuth, message: impl Into<String>) -> Self {
        Self {
            azimuth,
            message: message.into(),
        }
    }
}

/// Failure of the external encoder process.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// The process could not be started.
    #[error("failed to spawn encoder '{program}': {message}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// OS-level diagnostic.
        message: String,
    },

    /// The process ran and exited unsuccessfully.
    #[error("encoder exited with code {}: {stderr}", code.map_or_else(|| "<signal>".to_string(), |c| c.to_string()))]
    Exit {
        /// Exit code, `None` when terminated by a signal.
        code: Option<i32>,
        /// Captured diagnostic output.
        stderr: String,
    },

    /// The process exceeded the configured timeout and was killed.
    #[error("encoder timed out after {secs}s")]
    Timeout {
        /// Configured limit in seconds.
        secs: u64,
    },

    /// Waiting on the process or moving its output into place failed.
    #[error("encoder i/o error: {0}")]
    Io(String),
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
