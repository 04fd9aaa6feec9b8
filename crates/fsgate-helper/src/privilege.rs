//! One-way transition to the administrative identity.
//!
//! # Design
//! - [`PrivilegeAcquirer::acquire`] consumes the acquirer, so it runs at most once per
//!   process, and requires the [`Authorized`] proof of the caller check.
//! - Success yields the [`Elevated`] token required by the executor; there is no way back.
//! - Identity syscalls sit behind [`IdentityControl`] for privilege-free tests.

use nix::errno::Errno;
use nix::unistd::{Gid, Uid, getuid, geteuid, setgid, setuid};
use tracing::info;

use crate::error::{HelperError, HelperResult};
use crate::verify::Authorized;

/// User and group id of the administrative identity.
pub const ROOT_ID: u32 = 0;

/// Process identity operations.
pub trait IdentityControl {
    /// Set the real and effective user id.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by the system.
    fn set_user(&self, uid: u32) -> Result<(), Errno>;

    /// Set the real and effective group id.
    ///
    /// # Errors
    ///
    /// Returns the errno reported by the system.
    fn set_group(&self, gid: u32) -> Result<(), Errno>;

    /// Real user id currently in effect.
    fn real_user(&self) -> u32;

    /// Effective user id currently in effect.
    fn effective_user(&self) -> u32;
}

/// [`IdentityControl`] backed by the process credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NixIdentityControl;

impl IdentityControl for NixIdentityControl {
    fn set_user(&self, uid: u32) -> Result<(), Errno> {
        setuid(Uid::from_raw(uid))
    }

    fn set_group(&self, gid: u32) -> Result<(), Errno> {
        setgid(Gid::from_raw(gid))
    }

    fn real_user(&self) -> u32 {
        getuid().as_raw()
    }

    fn effective_user(&self) -> u32 {
        geteuid().as_raw()
    }
}

/// Capability token proving the process runs as the administrative identity.
#[derive(Debug)]
pub struct Elevated {
    uid: u32,
}

impl Elevated {
    /// Confirmed user id.
    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.uid
    }

    #[cfg(test)]
    pub(crate) const fn assumed() -> Self {
        Self { uid: ROOT_ID }
    }
}

/// Performs the privilege transition exactly once.
#[derive(Debug)]
pub struct PrivilegeAcquirer<C> {
    control: C,
}

impl<C: IdentityControl> PrivilegeAcquirer<C> {
    /// Wrap an identity control.
    pub const fn new(control: C) -> Self {
        Self { control }
    }

    /// Switch user then group to root and confirm the result by reading it back.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::PrivilegeAcquisition`] naming the step that failed.
    pub fn acquire(self, caller: &Authorized) -> HelperResult<Elevated> {
        self.control
            .set_user(ROOT_ID)
            .map_err(|errno| failure("set_user", None, Some(errno)))?;
        self.control
            .set_group(ROOT_ID)
            .map_err(|errno| failure("set_group", None, Some(errno)))?;

        let real = self.control.real_user();
        let effective = self.control.effective_user();
        if real != ROOT_ID {
            return Err(failure("confirm_identity", Some(real), None));
        }
        if effective != ROOT_ID {
            return Err(failure("confirm_identity", Some(effective), None));
        }

        info!(parent_pid = caller.parent_pid(), "privileges acquired");
        Ok(Elevated { uid: real })
    }
}

const fn failure(step: &'static str, observed_uid: Option<u32>, source: Option<Errno>) -> HelperError {
    HelperError::PrivilegeAcquisition {
        step,
        observed_uid,
        source,
    }
}
