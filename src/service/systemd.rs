use crate::cmd;
use crate::error::ProvisionResult;
use crate::service::{ServiceManager, StatusReport, parse_show};

/// System-wide systemd instance driven through `systemctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Systemd;

impl Systemd {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ServiceManager for Systemd {
    fn stop(&self, unit: &str) -> ProvisionResult<()> {
        let probe = cmd::probe("systemctl", &["stop", unit])?;
        if probe.success {
            return Ok(());
        }

        // A unit that does not exist or is not running is already
        // in the desired state.
        let status = self.status(unit)?;
        if status.is_loaded() && !status.is_stopped() {
            cmd::run("systemctl", &["stop", unit])?;
        }
        Ok(())
    }

    fn restart(&self, unit: &str) -> ProvisionResult<()> {
        cmd::run("systemctl", &["restart", unit]).map(drop)
    }

    fn enable(&self, unit: &str) -> ProvisionResult<()> {
        cmd::run("systemctl", &["enable", unit]).map(drop)
    }

    fn daemon_reload(&self) -> ProvisionResult<()> {
        cmd::run("systemctl", &["daemon-reload"]).map(drop)
    }

    fn status(&self, unit: &str) -> ProvisionResult<StatusReport> {
        let probe = cmd::probe(
            "systemctl",
            &[
                "show",
                unit,
                "--no-pager",
                "--property=LoadState,ActiveState,SubState",
            ],
        )?;
        Ok(parse_show(unit, &probe.stdout))
    }
}
