use std::fmt;

use serde::Serialize;

use crate::service::StatusReport;

/// The ordered steps of an install. Both installer variants run a
/// subset of these, always in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    PrivilegeCheck,
    ServiceStop,
    DependencyInstall,
    StatePreservation,
    WorkspaceReset,
    FileDeployment,
    StateRestoration,
    PythonEnvironment,
    ReverseProxy,
    Certificate,
    SupervisorInstall,
    Verification,
}

impl Stage {
    #[must_use]
    pub const fn all() -> [Self; 12] {
        [
            Self::PrivilegeCheck,
            Self::ServiceStop,
            Self::DependencyInstall,
            Self::StatePreservation,
            Self::WorkspaceReset,
            Self::FileDeployment,
            Self::StateRestoration,
            Self::PythonEnvironment,
            Self::ReverseProxy,
            Self::Certificate,
            Self::SupervisorInstall,
            Self::Verification,
        ]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PrivilegeCheck => "privilege check",
            Self::ServiceStop => "service stop",
            Self::DependencyInstall => "dependency install",
            Self::StatePreservation => "state preservation",
            Self::WorkspaceReset => "workspace reset",
            Self::FileDeployment => "file deployment",
            Self::StateRestoration => "state restoration",
            Self::PythonEnvironment => "python environment",
            Self::ReverseProxy => "reverse proxy",
            Self::Certificate => "certificate",
            Self::SupervisorInstall => "supervisor install",
            Self::Verification => "verification",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a stage that did not abort the install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "kebab-case")]
pub enum StageOutcome {
    Done,
    /// Postcondition already held, nothing was changed.
    NoOp(String),
    /// Failed, but the install carried on.
    Advisory(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

/// Everything a completed install did, stage by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub stages: Vec<StageRecord>,
    pub status: Option<StatusReport>,
}

impl InstallReport {
    pub(crate) fn record(&mut self, stage: Stage, outcome: StageOutcome) {
        self.stages.push(StageRecord { stage, outcome });
    }

    #[must_use]
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    /// Advisory messages collected during the run.
    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter_map(|r| match &r.outcome {
                StageOutcome::Advisory(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn ran(&self) -> Vec<Stage> {
        self.stages.iter().map(|r| r.stage).collect()
    }
}
