use std::path::Path;

use crate::cmd;
use crate::error::ProvisionResult;
use crate::python::{PythonRuntime, VirtualEnv};

/// The host's `python3` with the stdlib `venv` module.
#[derive(Debug, Clone)]
pub struct SystemPython {
    pub interpreter: String,
}

impl SystemPython {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interpreter: "python3".to_string(),
        }
    }

    #[must_use]
    pub fn interpreter(mut self, program: &str) -> Self {
        self.interpreter = program.to_string();
        self
    }
}

impl Default for SystemPython {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonRuntime for SystemPython {
    fn create_venv(&self, dir: &Path) -> ProvisionResult<VirtualEnv> {
        let target = dir.to_string_lossy();
        cmd::run_interactive(&self.interpreter, &["-m", "venv", &target])?;
        Ok(VirtualEnv::new(dir))
    }

    fn pip(&self, env: &VirtualEnv, args: &[&str]) -> ProvisionResult<()> {
        let pip = env.pip();
        cmd::run_interactive(&pip.to_string_lossy(), args)
    }

    fn freeze(&self, env: &VirtualEnv) -> ProvisionResult<String> {
        let pip = env.pip();
        cmd::run(&pip.to_string_lossy(), &["freeze", "--all"])
    }
}
