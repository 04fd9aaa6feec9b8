//! # Design
//!
//! - Constant messages with context fields, mirroring the helper's error shape.
//! - Dispatch errors mean the helper never produced a result; helper-side failures arrive as
//!   an [`fsgate_ops::ExecutionResult`] instead.

use std::io;
use std::path::PathBuf;

use fsgate_ops::EncodeError;
use thiserror::Error;

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Failures on the restricted-privilege side of the boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The configured helper executable is missing.
    #[error("privileged helper unavailable")]
    HelperUnavailable {
        /// Configured helper path.
        path: PathBuf,
    },
    /// The descriptor could not be encoded.
    #[error("failed to encode operation descriptor")]
    Encode {
        /// Underlying codec error.
        source: EncodeError,
    },
    /// The transport file could not be written.
    #[error("failed to write transport file")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Transport path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The helper process could not be launched or awaited.
    #[error("failed to run privileged helper")]
    Launch {
        /// Operation that failed.
        operation: &'static str,
        /// Helper executable.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl DispatchError {
    pub(crate) fn transport(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Transport {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn launch(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Launch {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Human-readable message for an end-user dialog.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::HelperUnavailable { path } => {
                format!("privileged helper unavailable at {}", path.display())
            }
            Self::Encode { source } => format!("failed to encode operation: {source}"),
            Self::Transport { path, source, .. } => {
                format!("failed to write transport {}: {source}", path.display())
            }
            Self::Launch { path, source, .. } => {
                format!("failed to run helper {}: {source}", path.display())
            }
        }
    }
}
