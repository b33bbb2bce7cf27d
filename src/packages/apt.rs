use crate::cmd;
use crate::error::ProvisionResult;
use crate::packages::PackageManager;

/// Debian/Ubuntu package manager driven through `apt-get` and
/// `dpkg-query`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Apt;

impl Apt {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl PackageManager for Apt {
    fn refresh_index(&self) -> ProvisionResult<()> {
        cmd::run_interactive("apt-get", &["update"])
    }

    fn is_installed(&self, name: &str) -> ProvisionResult<bool> {
        let probe = cmd::probe("dpkg-query", &["-W", "-f=${Status}", name])?;
        Ok(probe.success && is_installed_status(&probe.stdout))
    }

    fn install(&self, names: &[&str]) -> ProvisionResult<()> {
        let mut args = vec![
            "DEBIAN_FRONTEND=noninteractive",
            "apt-get",
            "install",
            "-y",
            "--no-install-recommends",
        ];
        args.extend_from_slice(names);
        cmd::run_interactive("env", &args)
    }
}

/// `dpkg-query` reports removed-but-configured packages too; only
/// "install ok installed" counts.
#[must_use]
pub fn is_installed_status(status: &str) -> bool {
    status.trim() == "install ok installed"
}
