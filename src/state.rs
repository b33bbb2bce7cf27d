use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};

use crate::error::ProvisionResult;
use crate::workspace;

/// A persisted application file held outside the install directory
/// while that directory is wiped. The installer never reads the
/// contents.
#[derive(Debug)]
pub struct StateSnapshot {
    held: Option<Held>,
}

#[derive(Debug)]
struct Held {
    dir: TempDir,
    file: PathBuf,
}

impl StateSnapshot {
    /// Snapshot that restores nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self { held: None }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.held.is_none()
    }

    /// Where the captured copy currently lives, if any.
    #[must_use]
    pub fn held_path(&self) -> Option<&Path> {
        self.held.as_ref().map(|h| h.file.as_path())
    }

    /// Move the captured file to `destination` atomically. A no-op
    /// for an empty snapshot.
    pub fn restore(mut self, destination: &Path) -> ProvisionResult<bool> {
        let Some(held) = self.held.take() else {
            return Ok(false);
        };

        // The holding area may sit on another filesystem, so the
        // atomic step is the rename inside the destination directory.
        if let Err(e) = workspace::copy_atomic(&held.file, destination) {
            let _ = held.dir.keep();
            warn!(file = %held.file.display(), "restore failed, persisted state left in holding area");
            return Err(e.with_kept_state(&held.file));
        }
        info!(file = %destination.display(), "restored persisted state");
        drop(held.dir);
        Ok(true)
    }

    /// Give up on restoring and keep the captured copy on disk,
    /// returning its path so an operator can recover it.
    #[must_use]
    pub fn abandon(mut self) -> Option<PathBuf> {
        let held = self.held.take()?;
        let _ = held.dir.keep();
        warn!(file = %held.file.display(), "persisted state left in holding area");
        Some(held.file)
    }
}

/// Capture `path` into a fresh directory under `holding_root` if the
/// file exists. `holding_root` must lie outside the install
/// directory.
pub fn preserve(path: &Path, holding_root: &Path) -> ProvisionResult<StateSnapshot> {
    if !path.is_file() {
        return Ok(StateSnapshot::empty());
    }

    fs::create_dir_all(holding_root)?;
    let dir = tempfile::Builder::new()
        .prefix("ancora-state-")
        .tempdir_in(holding_root)?;
    let file = dir.path().join(path.file_name().unwrap_or_default());
    fs::copy(path, &file)?;

    info!(file = %path.display(), "preserved persisted state");
    Ok(StateSnapshot {
        held: Some(Held { dir, file }),
    })
}
