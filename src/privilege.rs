use crate::error::{ProvisionError, ProvisionResult};

/// Answers whether the installer may mutate the host.
pub trait Privileges {
    fn is_superuser(&self) -> bool;
}

/// Effective uid of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPrivileges;

impl Privileges for ProcessPrivileges {
    #[cfg(unix)]
    fn is_superuser(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(unix))]
    fn is_superuser(&self) -> bool {
        false
    }
}

/// Abort unless running as root. Performs no side effects, so it
/// must be the first thing an install does.
pub fn ensure_superuser(privileges: &dyn Privileges) -> ProvisionResult<()> {
    if privileges.is_superuser() {
        Ok(())
    } else {
        Err(ProvisionError::PermissionDenied(
            "installer must run as root (try: sudo ancora)".into(),
        ))
    }
}
