pub mod systemd;

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::error::ProvisionResult;
use crate::stage::StageOutcome;

/// Runtime state of a supervised unit, as reported by the service
/// manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub unit: String,
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
}

impl StatusReport {
    /// Report for a unit the manager has never heard of.
    #[must_use]
    pub fn not_found(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            load_state: "not-found".to_string(),
            active_state: "inactive".to_string(),
            sub_state: "dead".to_string(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active_state == "active" && self.sub_state == "running"
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.load_state == "loaded"
    }

    /// Nothing to stop: the unit is unknown or fully inactive. Any
    /// other state, including `activating` while a crashed unit waits
    /// to be restarted, still owns a process or a pending restart.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.load_state == "not-found" || self.active_state == "inactive"
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({}, {})",
            self.unit, self.active_state, self.sub_state, self.load_state
        )
    }
}

/// A process supervisor that owns unit lifecycles.
pub trait ServiceManager {
    /// Stop the unit. Must succeed if the unit is unknown or
    /// already stopped.
    fn stop(&self, unit: &str) -> ProvisionResult<()>;

    fn restart(&self, unit: &str) -> ProvisionResult<()>;

    /// Enable the unit for boot-time start.
    fn enable(&self, unit: &str) -> ProvisionResult<()>;

    /// Re-read unit definitions from disk.
    fn daemon_reload(&self) -> ProvisionResult<()>;

    fn status(&self, unit: &str) -> ProvisionResult<StatusReport>;
}

/// Stop `unit` unless it is unknown or inactive. A unit that was
/// never installed is the expected state on a first install.
pub fn stop(manager: &dyn ServiceManager, unit: &str) -> ProvisionResult<StageOutcome> {
    let status = manager.status(unit)?;
    if status.is_stopped() {
        return Ok(StageOutcome::NoOp(format!("{unit} not running")));
    }

    info!(%unit, state = %status.active_state, sub = %status.sub_state, "stopping service");
    manager.stop(unit)?;
    Ok(StageOutcome::Done)
}

/// Parse `systemctl show --property=...` output (`Key=value` per
/// line). Missing keys fall back to the not-found report.
#[must_use]
pub fn parse_show(unit: &str, output: &str) -> StatusReport {
    let mut report = StatusReport::not_found(unit);

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key {
            "LoadState" => report.load_state = value,
            "ActiveState" => report.active_state = value,
            "SubState" => report.sub_state = value,
            _ => {}
        }
    }

    report
}
