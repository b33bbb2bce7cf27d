pub mod venv;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ProvisionError, ProvisionResult};

/// Handle to an isolated Python environment on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    pub root: PathBuf,
}

impl VirtualEnv {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of an executable inside the environment's `bin/`.
    #[must_use]
    pub fn bin(&self, name: &str) -> PathBuf {
        self.root.join("bin").join(name)
    }

    #[must_use]
    pub fn python(&self) -> PathBuf {
        self.bin("python")
    }

    #[must_use]
    pub fn pip(&self) -> PathBuf {
        self.bin("pip")
    }
}

/// A Python toolchain able to create environments and drive pip in
/// them.
pub trait PythonRuntime {
    fn create_venv(&self, dir: &Path) -> ProvisionResult<VirtualEnv>;

    /// Run pip inside `env` with the given arguments.
    fn pip(&self, env: &VirtualEnv, args: &[&str]) -> ProvisionResult<()>;

    /// `pip freeze` output for `env`.
    fn freeze(&self, env: &VirtualEnv) -> ProvisionResult<String>;
}

/// Upgrade pip itself, then install the declared requirements.
/// Version resolution is left entirely to pip.
pub fn install_requirements(
    runtime: &dyn PythonRuntime,
    env: &VirtualEnv,
    requirements: &Path,
) -> ProvisionResult<()> {
    if !requirements.is_file() {
        return Err(ProvisionError::FileNotFound(
            requirements.display().to_string(),
        ));
    }

    info!("upgrading pip");
    runtime.pip(env, &["install", "--upgrade", "pip"])?;

    info!(file = %requirements.display(), "installing requirements");
    let req = requirements.to_string_lossy();
    runtime.pip(env, &["install", "-r", &req])
}

/// Installed distributions of `env` as `(name, version)` pairs.
pub fn installed_packages(
    runtime: &dyn PythonRuntime,
    env: &VirtualEnv,
) -> ProvisionResult<Vec<(String, String)>> {
    Ok(parse_freeze(&runtime.freeze(env)?))
}

/// Parse `pip freeze` output. Only pinned `name==version` lines are
/// returned; editable installs and direct references are skipped.
#[must_use]
pub fn parse_freeze(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
        .filter_map(|l| {
            let (name, version) = l.split_once("==")?;
            Some((name.trim().to_string(), version.trim().to_string()))
        })
        .collect()
}
