use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{ProvisionError, ProvisionResult};

/// Captured result of a command whose exit code is an answer rather
/// than a failure (`systemctl is-active`, `dpkg-query`, ...).
#[derive(Debug, Clone)]
pub struct Probe {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command and capture its output. Fails if the command
/// returns a non-zero exit code.
pub fn run(program: &str, args: &[&str]) -> ProvisionResult<String> {
    let output = spawn(program, args)?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let command = format_command(program, args);
        debug!(%command, %stderr, "command failed");
        Err(ProvisionError::CommandFailed {
            command,
            status: output.status,
        })
    }
}

/// Run a command and report how it exited without treating a
/// non-zero status as an error. Spawn failures still propagate.
pub fn probe(program: &str, args: &[&str]) -> ProvisionResult<Probe> {
    let output = spawn(program, args)?;

    Ok(Probe {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Run a command with stdin/stdout/stderr inherited so package
/// managers and pip can stream their progress.
pub fn run_interactive(program: &str, args: &[&str]) -> ProvisionResult<()> {
    debug!(command = %format_command(program, args), "running");

    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| not_found_or_io(program, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(ProvisionError::CommandFailed {
            command: format_command(program, args),
            status,
        })
    }
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn spawn(program: &str, args: &[&str]) -> ProvisionResult<Output> {
    debug!(command = %format_command(program, args), "running");

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| not_found_or_io(program, e))
}

fn not_found_or_io(program: &str, e: std::io::Error) -> ProvisionError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ProvisionError::CommandNotFound(program.to_string())
    } else {
        ProvisionError::Io(e)
    }
}

pub(crate) fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
