use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by acquisition and export.
///
/// Parameter clamping and kernel-size coercion are never errors; they are
/// normalized silently where the value is used.
#[derive(Debug, Error)]
pub enum VeinError {
    /// The video source could not be opened. Fatal, never retried.
    #[error("video source unavailable ({source_id}): {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    /// A single frame read failed. The acquisition loop waits and retries.
    #[error("transient read failure: {0}")]
    TransientReadFailure(String),

    /// Too many consecutive read failures; the source is considered dead.
    #[error("video source lost after {attempts} consecutive read failures")]
    SourceLost { attempts: u32 },

    /// Writing a snapshot failed. Reported to the user, the loop continues.
    #[error("failed to export {}: {reason}", path.display())]
    ExportFailure { path: PathBuf, reason: String },
}

impl VeinError {
    pub fn unavailable(source_id: impl ToString, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn transient(reason: impl ToString) -> Self {
        Self::TransientReadFailure(reason.to_string())
    }

    /// Whether the control loop must stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. } | Self::SourceLost { .. })
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, VeinError>;
