//! # Design
//!
//! - Constant error messages; context (operation, path, field) lives in fields.
//! - Every error maps to exactly one helper exit status.
//! - `reason()` yields the short item reason recorded in partial-failure reports; `describe()`
//!   adds the path for fatal reports.

use std::io;
use std::path::{Path, PathBuf};

use fsgate_ops::{DecodeError, HelperExit};
use nix::errno::Errno;
use thiserror::Error;

/// Result type for helper operations.
pub type HelperResult<T> = Result<T, HelperError>;

/// Errors produced by the privileged helper.
#[derive(Debug, Error)]
pub enum HelperError {
    /// The launching process is not the trusted front end.
    #[error("caller is not the trusted front end")]
    UnauthorizedCaller {
        /// Trusted executable path compiled into the helper.
        expected: PathBuf,
        /// Executable path of the launching process, when it could be resolved.
        actual: Option<PathBuf>,
        /// Process id of the launching process.
        parent_pid: u32,
    },
    /// The launching process could not be inspected.
    #[error("caller identity could not be inspected")]
    CallerInspection {
        /// Underlying IO error.
        source: io::Error,
    },
    /// Elevated identity was not fully acquired.
    #[error("privilege acquisition failed")]
    PrivilegeAcquisition {
        /// Step of the acquisition sequence that failed.
        step: &'static str,
        /// Effective user observed after the attempt, when read back.
        observed_uid: Option<u32>,
        /// Underlying nix error, when the step was a syscall.
        source: Option<Errno>,
    },
    /// The transport payload could not be read.
    #[error("transport payload unreadable")]
    Transport {
        /// Operation that failed.
        operation: &'static str,
        /// Transport location involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The transport payload did not decode into a descriptor.
    #[error("operation descriptor rejected")]
    Decode {
        /// Underlying codec error.
        source: DecodeError,
    },
    /// IO failures while interacting with the filesystem.
    #[error("helper io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("helper walkdir failure")]
    Walkdir {
        /// Operation that triggered the traversal failure.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Zip archive failures.
    #[error("helper zip failure")]
    Zip {
        /// Operation that triggered the archive failure.
        operation: &'static str,
        /// Archive involved in the failure.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Nix syscall failures.
    #[error("helper nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying errno.
        source: Errno,
    },
    /// User lookup failed while resolving an owner.
    #[error("helper user lookup failed")]
    UserLookup {
        /// User name that failed lookup.
        user: String,
        /// Underlying errno.
        source: Errno,
    },
    /// Group lookup failed while resolving a group.
    #[error("helper group lookup failed")]
    GroupLookup {
        /// Group name that failed lookup.
        group: String,
        /// Underlying errno.
        source: Errno,
    },
    /// A destination entry already exists and is never overwritten.
    #[error("destination already exists")]
    DestinationExists {
        /// Occupied destination path.
        path: PathBuf,
    },
    /// Input validation failures.
    #[error("helper invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Unsupported operation or format.
    #[error("helper unsupported operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Value that triggered the error.
        value: Option<String>,
    },
    /// An external capability is not available in this build.
    #[error("helper capability unavailable")]
    CapabilityUnavailable {
        /// Capability that was requested.
        capability: &'static str,
    },
}

impl HelperError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn nix(operation: &'static str, path: impl Into<PathBuf>, source: Errno) -> Self {
        Self::Nix {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Exit status that terminates an invocation failing with this error.
    #[must_use]
    pub const fn exit(&self) -> HelperExit {
        match self {
            Self::UnauthorizedCaller { .. } | Self::CallerInspection { .. } => {
                HelperExit::UnauthorizedCaller
            }
            Self::PrivilegeAcquisition { .. } => HelperExit::PrivilegeAcquisitionFailed,
            Self::Transport { .. } | Self::Decode { .. } => HelperExit::DecodeFailed,
            _ => HelperExit::OperationFailed,
        }
    }

    /// Short reason recorded against a failed item (`not found`, `permission denied`, ...).
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Io { source, .. } | Self::Transport { source, .. } => io_reason(source),
            Self::Walkdir { source, .. } => source
                .io_error()
                .map_or_else(|| source.to_string(), io_reason),
            Self::Zip { source, .. } => format!("invalid archive: {source}"),
            Self::Nix { source, .. } => errno_reason(*source),
            Self::UserLookup { user, source } => {
                format!("user lookup for `{user}` failed: {}", source.desc())
            }
            Self::GroupLookup { group, source } => {
                format!("group lookup for `{group}` failed: {}", source.desc())
            }
            Self::DestinationExists { .. } => "already exists".to_string(),
            Self::InvalidInput {
                field,
                reason,
                value,
            } => value.as_ref().map_or_else(
                || format!("invalid {field}: {reason}"),
                |value| format!("invalid {field}: {reason} ({value})"),
            ),
            Self::Unsupported { operation, value } => value.as_ref().map_or_else(
                || format!("unsupported {operation}"),
                |value| format!("unsupported {operation}: {value}"),
            ),
            Self::CapabilityUnavailable { capability } => {
                format!("{capability} capability unavailable")
            }
            Self::Decode { source } => source.describe(),
            Self::UnauthorizedCaller { .. } | Self::CallerInspection { .. } => {
                "unauthorized caller".to_string()
            }
            Self::PrivilegeAcquisition { .. } => "unable to acquire root".to_string(),
        }
    }

    /// Human-readable reason for a fatal report.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::UnauthorizedCaller {
                expected,
                actual,
                parent_pid,
            } => format!(
                "unauthorized caller: parent process {parent_pid} is {} (expected {})",
                actual
                    .as_deref()
                    .map_or_else(|| "unresolvable".to_string(), display),
                expected.display()
            ),
            Self::CallerInspection { source } => {
                format!("unauthorized caller: parent process could not be inspected: {source}")
            }
            Self::PrivilegeAcquisition {
                step,
                observed_uid,
                source,
            } => {
                let mut message = format!("unable to acquire root: {step} failed");
                if let Some(errno) = source {
                    message.push_str(": ");
                    message.push_str(errno.desc());
                }
                if let Some(uid) = observed_uid {
                    message.push_str(&format!(" (effective uid {uid})"));
                }
                message
            }
            Self::Transport { path, source, .. } => {
                format!("transport {} unreadable: {source}", path.display())
            }
            Self::Io { path, .. }
            | Self::Walkdir { path, .. }
            | Self::Zip { path, .. }
            | Self::Nix { path, .. }
            | Self::DestinationExists { path } => {
                format!("{}: {}", path.display(), self.reason())
            }
            _ => self.reason(),
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn io_reason(error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::NotFound => "not found".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        io::ErrorKind::AlreadyExists => "already exists".to_string(),
        _ => error.to_string(),
    }
}

fn errno_reason(errno: Errno) -> String {
    match errno {
        Errno::ENOENT => "not found".to_string(),
        Errno::EACCES | Errno::EPERM => "permission denied".to_string(),
        Errno::EEXIST => "already exists".to_string(),
        other => other.desc().to_string(),
    }
}
