use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ProvisionError, ProvisionResult};
use crate::python::VirtualEnv;
use crate::workspace;

/// systemd `Restart=` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
    OnFailure,
    No,
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Always => "always",
            Self::OnFailure => "on-failure",
            Self::No => "no",
        })
    }
}

/// Typed description of a systemd service unit for a Python web
/// app served from a virtual environment.
///
/// # Example
///
/// ```
/// use ancora::ServiceUnit;
///
/// let unit = ServiceUnit::new("tradingalert", "/opt/tradingalert")
///     .bind("127.0.0.1:5000")
///     .env("PYTHONUNBUFFERED", "1");
///
/// let text = unit.render().contents;
/// assert!(text.contains("Restart=always"));
/// assert!(text.contains("/opt/tradingalert/venv/bin/gunicorn"));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceUnit {
    pub name: String,
    pub description: String,
    pub working_directory: PathBuf,
    pub venv: VirtualEnv,
    pub launcher: String,
    pub launcher_args: Vec<String>,
    pub bind: String,
    pub app: String,
    pub restart: RestartPolicy,
    pub restart_sec: u32,
    pub user: Option<String>,
    pub env: Vec<(String, String)>,
    pub after: Vec<String>,
    pub wanted_by: String,
}

impl ServiceUnit {
    #[must_use]
    pub fn new(name: &str, install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        Self {
            name: name.to_string(),
            description: format!("{name} web service"),
            venv: VirtualEnv::new(install_dir.join("venv")),
            working_directory: install_dir,
            launcher: "gunicorn".to_string(),
            launcher_args: vec!["--workers".to_string(), "1".to_string()],
            bind: "127.0.0.1:5000".to_string(),
            app: "webapp:create_app()".to_string(),
            restart: RestartPolicy::Always,
            restart_sec: 10,
            user: None,
            env: vec![("PYTHONUNBUFFERED".to_string(), "1".to_string())],
            after: vec!["network.target".to_string()],
            wanted_by: "multi-user.target".to_string(),
        }
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }

    /// Executable inside the venv's `bin/` that serves the app.
    #[must_use]
    pub fn launcher(mut self, program: &str) -> Self {
        self.launcher = program.to_string();
        self
    }

    /// Replace the arguments passed to the launcher before `--bind`.
    #[must_use]
    pub fn launcher_args(mut self, args: &[&str]) -> Self {
        self.launcher_args = args.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind = addr.to_string();
        self
    }

    /// WSGI entry point, e.g. `webapp:create_app()`.
    #[must_use]
    pub fn app(mut self, entry: &str) -> Self {
        self.app = entry.to_string();
        self
    }

    #[must_use]
    pub const fn restart(mut self, policy: RestartPolicy, delay_secs: u32) -> Self {
        self.restart = policy;
        self.restart_sec = delay_secs;
        self
    }

    #[must_use]
    pub fn user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// Add or replace an environment variable.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.retain(|(k, _)| k != key);
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn after(mut self, target: &str) -> Self {
        self.after.push(target.to_string());
        self
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.service", self.name)
    }

    #[must_use]
    pub fn exec_start(&self) -> String {
        let mut parts = vec![self.venv.bin(&self.launcher).display().to_string()];
        parts.extend(self.launcher_args.iter().cloned());
        parts.push("--bind".to_string());
        parts.push(self.bind.clone());
        parts.push(format!("'{}'", self.app));
        parts.join(" ")
    }

    #[must_use]
    pub fn render(&self) -> UnitDefinition {
        let mut out = String::new();
        let _ = writeln!(out, "[Unit]");
        let _ = writeln!(out, "Description={}", self.description);
        if !self.after.is_empty() {
            let _ = writeln!(out, "After={}", self.after.join(" "));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "[Service]");
        let _ = writeln!(out, "Type=simple");
        if let Some(user) = &self.user {
            let _ = writeln!(out, "User={user}");
        }
        let _ = writeln!(
            out,
            "WorkingDirectory={}",
            self.working_directory.display()
        );
        for (k, v) in &self.env {
            let _ = writeln!(out, "Environment=\"{k}={v}\"");
        }
        let _ = writeln!(out, "ExecStart={}", self.exec_start());
        let _ = writeln!(out, "Restart={}", self.restart);
        let _ = writeln!(out, "RestartSec={}", self.restart_sec);
        let _ = writeln!(out);
        let _ = writeln!(out, "[Install]");
        let _ = writeln!(out, "WantedBy={}", self.wanted_by);

        UnitDefinition {
            name: self.file_name(),
            contents: out,
        }
    }
}

/// Unit file name plus its full text, ready to be written to the
/// supervisor's unit directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDefinition {
    pub name: String,
    pub contents: String,
}

impl UnitDefinition {
    /// Value of the first `key=` line, ignoring comments.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.starts_with('#') && !l.starts_with(';'))
            .find_map(|l| {
                let (k, v) = l.split_once('=')?;
                (k.trim() == key).then(|| v.trim())
            })
    }

    /// Problems that would keep the unit from running the app out of
    /// `install_dir` or from surviving a crash.
    #[must_use]
    pub fn problems(&self, install_dir: &Path) -> Vec<String> {
        let mut problems = Vec::new();

        if self.value("Restart") != Some("always") {
            problems.push("unit does not declare Restart=always".to_string());
        }
        if self.value("RestartSec").is_none() {
            problems.push("unit does not declare a RestartSec cooldown".to_string());
        }

        let venv_bin = install_dir.join("venv").join("bin");
        let venv_bin = venv_bin.to_string_lossy();
        match self.value("ExecStart") {
            Some(cmd) if cmd.trim_start_matches(['-', '@', '+', '!']).starts_with(&*venv_bin) => {}
            Some(_) => problems.push(format!("ExecStart does not run from {venv_bin}")),
            None => problems.push("unit has no ExecStart".to_string()),
        }

        problems
    }
}

/// Read a pre-supplied unit file verbatim.
pub fn load_unit(path: &Path) -> ProvisionResult<UnitDefinition> {
    if !path.is_file() {
        return Err(ProvisionError::FileNotFound(path.display().to_string()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ProvisionError::FileNotFound(path.display().to_string()))?;

    Ok(UnitDefinition {
        name,
        contents: fs::read_to_string(path)?,
    })
}

/// Write the unit into `unit_dir` atomically and return its path.
pub fn install_unit(def: &UnitDefinition, unit_dir: &Path) -> ProvisionResult<PathBuf> {
    let target = unit_dir.join(&def.name);
    workspace::write_atomic(&target, def.contents.as_bytes())?;
    info!(unit = %target.display(), "installed unit file");
    Ok(target)
}
