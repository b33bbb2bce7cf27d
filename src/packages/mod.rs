pub mod apt;

use tracing::info;

use crate::error::{ProvisionError, ProvisionResult};
use crate::stage::StageOutcome;

/// An OS package manager that can tell what is installed and add
/// what is not.
pub trait PackageManager {
    /// Refresh the package index.
    fn refresh_index(&self) -> ProvisionResult<()>;

    /// Whether `name` is currently installed.
    fn is_installed(&self, name: &str) -> ProvisionResult<bool>;

    /// Install every package in `names` in one transaction.
    fn install(&self, names: &[&str]) -> ProvisionResult<()>;
}

/// Make sure every package in `names` is present. The index is
/// refreshed once; only missing packages are installed, so a second
/// run changes nothing.
pub fn ensure_packages(
    manager: &dyn PackageManager,
    names: &[String],
) -> ProvisionResult<StageOutcome> {
    manager
        .refresh_index()
        .map_err(|e| ProvisionError::PackageInstall(format!("index refresh failed: {e}")))?;

    let mut missing = Vec::new();
    for name in dedup(names) {
        if !manager.is_installed(name)? {
            missing.push(name);
        }
    }

    if missing.is_empty() {
        return Ok(StageOutcome::NoOp("all packages already installed".into()));
    }

    info!(packages = %missing.join(" "), "installing missing packages");
    manager
        .install(&missing)
        .map_err(|e| ProvisionError::PackageInstall(format!("{}: {e}", missing.join(" "))))?;

    Ok(StageOutcome::Done)
}

fn dedup(names: &[String]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if !seen.contains(&name.as_str()) {
            seen.push(name.as_str());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        present: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl PackageManager for Recorder {
        fn refresh_index(&self) -> ProvisionResult<()> {
            self.calls.borrow_mut().push("update".into());
            Ok(())
        }

        fn is_installed(&self, name: &str) -> ProvisionResult<bool> {
            Ok(self.present.contains(&name))
        }

        fn install(&self, names: &[&str]) -> ProvisionResult<()> {
            self.calls
                .borrow_mut()
                .push(format!("install {}", names.join(" ")));
            Ok(())
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn installs_only_missing() {
        let apt = Recorder {
            present: vec!["nginx"],
            ..Recorder::default()
        };

        let outcome = ensure_packages(&apt, &names(&["nginx", "certbot", "certbot"])).unwrap();

        assert_eq!(outcome, StageOutcome::Done);
        assert_eq!(*apt.calls.borrow(), vec!["update", "install certbot"]);
    }

    #[test]
    fn nothing_missing_is_noop() {
        let apt = Recorder {
            present: vec!["nginx"],
            ..Recorder::default()
        };

        let outcome = ensure_packages(&apt, &names(&["nginx"])).unwrap();

        assert!(matches!(outcome, StageOutcome::NoOp(_)));
        assert_eq!(*apt.calls.borrow(), vec!["update"]);
    }
}
