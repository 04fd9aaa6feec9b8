//! Caller verification: the single access-control boundary of the helper.
//!
//! # Design
//! - Runs before any privilege change, filesystem access or descriptor decoding.
//! - Process introspection is a trait so the check can be exercised without real process
//!   trees.
//! - Trust is exact byte equality of the parent's executable path with a path fixed at
//!   build time; anything unresolvable fails closed.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HelperError, HelperResult};

/// Executable path of the only process allowed to launch the helper.
pub const TRUSTED_PARENT: &str = match option_env!("FSGATE_TRUSTED_PARENT") {
    Some(path) => path,
    None => "/usr/libexec/fsgate/fsgate-frontend",
};

/// Identity of the process that launched the helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Helper process id.
    pub pid: u32,
    /// Immediate parent process id.
    pub parent_pid: u32,
    /// Executable of the parent, `None` when the platform cannot resolve it.
    pub parent_executable: Option<PathBuf>,
}

/// Source of caller identity.
pub trait ProcessInspector {
    /// Resolve the identity of the current invocation's caller.
    ///
    /// # Errors
    ///
    /// Returns an IO error when process information cannot be read.
    fn inspect(&self) -> io::Result<CallerIdentity>;
}

/// Process inspector backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcessInspector;

impl ProcessInspector for OsProcessInspector {
    fn inspect(&self) -> io::Result<CallerIdentity> {
        let parent = nix::unistd::getppid().as_raw();
        let parent_pid = u32::try_from(parent)
            .map_err(|_| io::Error::other(format!("invalid parent pid {parent}")))?;
        Ok(CallerIdentity {
            pid: std::process::id(),
            parent_pid,
            parent_executable: parent_executable(parent_pid)?,
        })
    }
}

#[cfg(target_os = "linux")]
fn parent_executable(parent_pid: u32) -> io::Result<Option<PathBuf>> {
    std::fs::read_link(format!("/proc/{parent_pid}/exe")).map(Some)
}

#[cfg(not(target_os = "linux"))]
fn parent_executable(_parent_pid: u32) -> io::Result<Option<PathBuf>> {
    Ok(None)
}

/// Proof that the caller check passed. Only [`CallerVerifier`] creates it.
#[derive(Debug)]
pub struct Authorized {
    parent_pid: u32,
}

impl Authorized {
    /// Process id of the verified caller.
    #[must_use]
    pub const fn parent_pid(&self) -> u32 {
        self.parent_pid
    }
}

/// Compares the caller's executable with the trusted front-end path.
#[derive(Debug, Clone)]
pub struct CallerVerifier<I> {
    inspector: I,
    trusted: PathBuf,
}

impl CallerVerifier<OsProcessInspector> {
    /// Verifier wired to the OS inspector and the build-time trusted path.
    #[must_use]
    pub fn system() -> Self {
        Self::new(OsProcessInspector, TRUSTED_PARENT)
    }
}

impl<I: ProcessInspector> CallerVerifier<I> {
    /// Build a verifier trusting exactly `trusted`.
    pub fn new(inspector: I, trusted: impl Into<PathBuf>) -> Self {
        Self {
            inspector,
            trusted: trusted.into(),
        }
    }

    /// Inspect the current caller and check it.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::CallerInspection`] when the caller cannot be inspected and
    /// [`HelperError::UnauthorizedCaller`] when it is not the trusted executable.
    pub fn verify(&self) -> HelperResult<Authorized> {
        let identity = self
            .inspector
            .inspect()
            .map_err(|source| HelperError::CallerInspection { source })?;
        self.check(&identity)
    }

    /// Check an already resolved identity.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::UnauthorizedCaller`] unless the parent executable equals the
    /// trusted path byte for byte.
    pub fn check(&self, identity: &CallerIdentity) -> HelperResult<Authorized> {
        let trusted = identity
            .parent_executable
            .as_deref()
            .is_some_and(|path| is_same_path(path, &self.trusted));
        if !trusted {
            return Err(HelperError::UnauthorizedCaller {
                expected: self.trusted.clone(),
                actual: identity.parent_executable.clone(),
                parent_pid: identity.parent_pid,
            });
        }
        debug!(
            pid = identity.pid,
            parent_pid = identity.parent_pid,
            "caller verified"
        );
        Ok(Authorized {
            parent_pid: identity.parent_pid,
        })
    }
}

fn is_same_path(candidate: &Path, trusted: &Path) -> bool {
    candidate.as_os_str() == trusted.as_os_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRONTEND: &str = "/usr/libexec/fsgate/fsgate-frontend";

    struct FixedInspector(io::Result<CallerIdentity>);

    impl ProcessInspector for FixedInspector {
        fn inspect(&self) -> io::Result<CallerIdentity> {
            match &self.0 {
                Ok(identity) => Ok(identity.clone()),
                Err(err) => Err(io::Error::new(err.kind(), err.to_string())),
            }
        }
    }

    fn caller(executable: Option<&str>) -> CallerIdentity {
        CallerIdentity {
            pid: 200,
            parent_pid: 100,
            parent_executable: executable.map(PathBuf::from),
        }
    }

    #[test]
    fn trusted_parent_is_authorized() -> anyhow::Result<()> {
        let verifier = CallerVerifier::new(FixedInspector(Ok(caller(Some(FRONTEND)))), FRONTEND);
        let authorized = verifier.verify()?;
        assert_eq!(authorized.parent_pid(), 100);
        Ok(())
    }

    #[test]
    fn any_other_executable_is_rejected() {
        for executable in [
            Some("/usr/bin/bash"),
            Some("/usr/libexec/fsgate/fsgate-frontend (deleted)"),
            Some("/usr/libexec/fsgate//fsgate-frontend"),
            Some("/usr/libexec/fsgate/fsgate-frontend/"),
            None,
        ] {
            let verifier = CallerVerifier::new(FixedInspector(Ok(caller(executable))), FRONTEND);
            assert!(
                matches!(
                    verifier.verify(),
                    Err(HelperError::UnauthorizedCaller { parent_pid: 100, .. })
                ),
                "{executable:?} must be rejected"
            );
        }
    }

    #[test]
    fn inspection_failure_fails_closed() {
        let verifier = CallerVerifier::new(
            FixedInspector(Err(io::Error::from(io::ErrorKind::PermissionDenied))),
            FRONTEND,
        );
        let err = verifier.verify().err();
        assert!(matches!(err, Some(HelperError::CallerInspection { .. })));
        assert_eq!(
            err.map(|err| err.exit()),
            Some(fsgate_ops::HelperExit::UnauthorizedCaller)
        );
    }

    #[test]
    fn os_inspector_reports_the_current_parent() -> anyhow::Result<()> {
        let identity = OsProcessInspector.inspect()?;
        assert_eq!(identity.pid, std::process::id());
        assert!(identity.parent_pid > 0);
        Ok(())
    }
}
