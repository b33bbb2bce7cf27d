//! Idempotent single-host installer for Python web services.
//!
//! Ancora replaces the usual `install.sh`: it installs OS packages,
//! rebuilds the install directory from the source tree, creates a
//! virtual environment, puts nginx and a Let's Encrypt certificate in
//! front of the app, and installs a systemd unit - all from a typed
//! Rust DSL.
//!
//! The name is Portuguese for *anchor*: the service is pinned to the
//! host and stays put across reinstalls.
//!
//! # Overview
//!
//! An install is an [`Installer`] that wires together:
//!
//! - A [`ServiceUnit`] describing the systemd unit (working
//!   directory, gunicorn command line, restart policy, environment)
//! - A [`SiteSource`] for the nginx site, either a file shipped with
//!   the app or a rendered [`NginxSite`]
//! - A [`HostEnvironment`] giving access to the machine: package
//!   manager, service manager, Python, nginx and the ACME client
//!
//! # Stages
//!
//! Every run walks the same ordered [`Stage`] list:
//!
//! 1. **Privilege check** - abort unless root
//! 2. **Service stop** - stop the unit if it is running
//! 3. **Dependency install** - apt-install what is missing
//! 4. **State preservation** - move `state.json` out of the way
//! 5. **Workspace reset** - wipe and recreate the install directory
//! 6. **File deployment** - copy the source tree in
//! 7. **State restoration** - move `state.json` back
//! 8. **Python environment** - venv, upgraded pip, requirements
//! 9. **Reverse proxy** - install, enable, validate, reload nginx
//! 10. **Certificate** - certbot; failure is only a warning
//! 11. **Supervisor install** - write the unit, enable, restart
//! 12. **Verification** - report the unit's status
//!
//! The minimal variant skips stages 9 and 10 and copies a unit file
//! from the source tree instead of rendering one. Re-running either
//! variant converges on the same host state.
//!
//! # Example
//!
//! ```rust,no_run
//! use ancora::{Installer, NginxSite, ServiceUnit, SiteSource};
//!
//! fn main() -> anyhow::Result<()> {
//!     let unit = ServiceUnit::new("tradingalert", "/opt/tradingalert")
//!         .bind("127.0.0.1:5000")
//!         .app("webapp:create_app()");
//!
//!     let site = NginxSite::new("alerts.example.com").upstream("127.0.0.1:5000");
//!
//!     Installer::full("tradingalert", "alerts.example.com", "ops@example.com")
//!         .unit(unit)
//!         .site(SiteSource::Rendered(site))
//!         .run()?;
//!     Ok(())
//! }
//! ```

// Allow noisy pedantic lints that don't add value for an
// installer crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod certificate;
pub mod cmd;
pub mod error;
pub mod host;
pub mod installer;
pub mod packages;
pub mod privilege;
pub mod proxy;
pub mod python;
pub mod service;
pub mod site;
pub mod stage;
pub mod state;
pub mod unit;
pub mod workspace;

pub use certificate::certbot::Certbot;
pub use error::{ProvisionError, ProvisionResult, Severity};
pub use host::HostEnvironment;
pub use installer::{Installer, Variant};
pub use packages::apt::Apt;
pub use proxy::SiteDirs;
pub use proxy::nginx::Nginx;
pub use python::VirtualEnv;
pub use python::venv::SystemPython;
pub use service::StatusReport;
pub use service::systemd::Systemd;
pub use site::{NginxSite, SiteSource};
pub use stage::{InstallReport, Stage, StageOutcome};
pub use unit::{RestartPolicy, ServiceUnit, UnitDefinition};
