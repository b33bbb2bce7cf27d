use std::process::ExitStatus;

use crate::stage::Stage;

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// How a failure affects the rest of the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Halts the workflow.
    Fatal,
    /// Logged with a remedy, the workflow continues.
    Advisory,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("command failed: {command}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("package install failed: {0}")]
    PackageInstall(String),

    #[error("invalid proxy configuration: {0}")]
    ProxyConfigInvalid(String),

    #[error("certificate request failed for {domain}: {reason}")]
    Certificate { domain: String, reason: String },

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("refusing to touch unsafe path: {0}")]
    UnsafePath(String),

    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("{source} (persisted state kept at {kept})")]
    StateKept {
        kept: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Wrap an error with the stage it happened in.
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Note where a held copy of the persisted state was left so the
    /// operator can recover it by hand.
    #[must_use]
    pub fn with_kept_state(self, kept: &std::path::Path) -> Self {
        Self::StateKept {
            kept: kept.display().to_string(),
            source: Box::new(self),
        }
    }

    /// Only certificate failures are downgraded; everything else
    /// stops the install.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Certificate { .. } => Severity::Advisory,
            Self::Stage { source, .. } | Self::StateKept { source, .. } => source.severity(),
            _ => Severity::Fatal,
        }
    }
}
