use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::certificate;
use crate::error::{ProvisionError, ProvisionResult};
use crate::host::HostEnvironment;
use crate::privilege;
use crate::proxy::{self, SiteDirs};
use crate::python;
use crate::service::{self, StatusReport};
use crate::site::SiteSource;
use crate::stage::{InstallReport, Stage, StageOutcome};
use crate::state::{self, StateSnapshot};
use crate::unit::{self, ServiceUnit, UnitDefinition};
use crate::workspace;

const FULL_PACKAGES: &[&str] = &[
    "python3-venv",
    "python3-pip",
    "nginx",
    "certbot",
    "python3-certbot-nginx",
];

const MINIMAL_PACKAGES: &[&str] = &["python3-venv", "python3-pip"];

/// Which installer flavour to run. Both share one workflow; the
/// minimal one skips the reverse proxy and certificate and uses a
/// unit file shipped with the source tree.
#[derive(Debug, Clone)]
pub enum Variant {
    Full {
        domain: String,
        email: String,
        site: Option<SiteSource>,
        unit: Option<ServiceUnit>,
    },
    Minimal {
        unit_file: PathBuf,
    },
}

/// Idempotent install of one Python web service on the local host.
///
/// # Example
///
/// ```rust,no_run
/// use ancora::Installer;
///
/// fn main() -> anyhow::Result<()> {
///     Installer::full("tradingalert", "alerts.example.com", "ops@example.com")
///         .install_dir("/opt/tradingalert")
///         .run()?;
///     Ok(())
/// }
/// ```
pub struct Installer {
    service: String,
    variant: Variant,
    install_dir: PathBuf,
    source_dir: PathBuf,
    requirements: PathBuf,
    unit_dir: PathBuf,
    sites: SiteDirs,
    holding_dir: PathBuf,
    state_file: String,
    preserve_state: bool,
    app_module: Option<String>,
    packages: Vec<String>,
    host: HostEnvironment,
}

impl Installer {
    /// Installer with reverse proxy and TLS for `domain`.
    #[must_use]
    pub fn full(service: &str, domain: &str, email: &str) -> Self {
        Self::with_variant(
            service,
            Variant::Full {
                domain: domain.to_string(),
                email: email.to_string(),
                site: None,
                unit: None,
            },
            FULL_PACKAGES,
        )
    }

    /// Installer without proxy or TLS, using `unit_file` verbatim.
    /// Relative paths are resolved against the source directory.
    #[must_use]
    pub fn minimal(service: &str, unit_file: &str) -> Self {
        Self::with_variant(
            service,
            Variant::Minimal {
                unit_file: PathBuf::from(unit_file),
            },
            MINIMAL_PACKAGES,
        )
    }

    fn with_variant(service: &str, variant: Variant, packages: &[&str]) -> Self {
        Self {
            service: service.to_string(),
            variant,
            install_dir: PathBuf::from("/opt").join(service),
            source_dir: PathBuf::from("."),
            requirements: PathBuf::from("requirements.txt"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            sites: SiteDirs::default(),
            holding_dir: std::env::temp_dir(),
            state_file: "state.json".to_string(),
            preserve_state: true,
            app_module: Some("webapp".to_string()),
            packages: packages.iter().map(ToString::to_string).collect(),
            host: HostEnvironment::system(),
        }
    }

    #[must_use]
    pub fn install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    #[must_use]
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Requirements file, relative to the source directory.
    #[must_use]
    pub fn requirements(mut self, path: &str) -> Self {
        self.requirements = PathBuf::from(path);
        self
    }

    #[must_use]
    pub fn unit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = dir.into();
        self
    }

    #[must_use]
    pub fn sites(mut self, dirs: SiteDirs) -> Self {
        self.sites = dirs;
        self
    }

    /// Where persisted state waits while the install directory is
    /// rebuilt. Must lie outside the install directory.
    #[must_use]
    pub fn holding_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.holding_dir = dir.into();
        self
    }

    #[must_use]
    pub fn state_file(mut self, name: &str) -> Self {
        self.state_file = name.to_string();
        self
    }

    /// Wipe the install directory without carrying the state file
    /// over.
    #[must_use]
    pub const fn without_state_preservation(mut self) -> Self {
        self.preserve_state = false;
        self
    }

    /// Python module whose presence is checked after deployment.
    #[must_use]
    pub fn app_module(mut self, module: &str) -> Self {
        self.app_module = Some(module.to_string());
        self
    }

    #[must_use]
    pub fn skip_app_check(mut self) -> Self {
        self.app_module = None;
        self
    }

    /// Replace the OS package list.
    #[must_use]
    pub fn packages(mut self, names: &[&str]) -> Self {
        self.packages = names.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn package(mut self, name: &str) -> Self {
        self.packages.push(name.to_string());
        self
    }

    /// Use a specific site configuration (full variant only).
    #[must_use]
    pub fn site(mut self, source: SiteSource) -> Self {
        if let Variant::Full { site, .. } = &mut self.variant {
            *site = Some(source);
        }
        self
    }

    /// Use a specific unit description (full variant only).
    #[must_use]
    pub fn unit(mut self, service_unit: ServiceUnit) -> Self {
        if let Variant::Full { unit, .. } = &mut self.variant {
            *unit = Some(service_unit);
        }
        self
    }

    #[must_use]
    pub fn host(mut self, host: HostEnvironment) -> Self {
        self.host = host;
        self
    }

    #[must_use]
    pub const fn variant(&self) -> &Variant {
        &self.variant
    }

    /// Name of the unit this install manages: the rendered unit's
    /// file name, or the supplied unit file's own name.
    #[must_use]
    pub fn unit_name(&self) -> String {
        match &self.variant {
            Variant::Full {
                unit: Some(unit), ..
            } => unit.file_name(),
            Variant::Minimal { unit_file } => unit_file.file_name().map_or_else(
                || format!("{}.service", self.service),
                |name| name.to_string_lossy().to_string(),
            ),
            Variant::Full { unit: None, .. } => format!("{}.service", self.service),
        }
    }

    /// Stages this installer runs, in order.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        let full = matches!(self.variant, Variant::Full { .. });
        Stage::all()
            .into_iter()
            .filter(|s| match s {
                Stage::ReverseProxy | Stage::Certificate => full,
                Stage::StatePreservation | Stage::StateRestoration => self.preserve_state,
                _ => true,
            })
            .collect()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.source_dir.join(path)
        }
    }

    fn site_source(&self) -> Option<SiteSource> {
        match &self.variant {
            Variant::Full { site, .. } => Some(
                site.clone()
                    .unwrap_or_else(|| SiteSource::File(self.resolve(Path::new("nginx_app.conf")))),
            ),
            Variant::Minimal { .. } => None,
        }
    }

    /// Rendered or loaded unit definition for this install.
    pub fn unit_definition(&self) -> ProvisionResult<UnitDefinition> {
        match &self.variant {
            Variant::Full { unit, .. } => Ok(unit
                .clone()
                .unwrap_or_else(|| ServiceUnit::new(&self.service, &self.install_dir))
                .render()),
            Variant::Minimal { unit_file } => {
                let def = unit::load_unit(&self.resolve(unit_file))?;
                for problem in def.problems(&self.install_dir) {
                    warn!(unit = %def.name, "{problem}");
                }
                Ok(def)
            }
        }
    }

    /// Run every stage against the host. Stops at the first fatal
    /// failure; certificate problems are reported in the returned
    /// report instead.
    pub fn install(&self) -> ProvisionResult<InstallReport> {
        let mut report = InstallReport::default();
        let host = &self.host;
        let stages = self.stages();
        let total = stages.len();
        let mut step = 0;
        let mut begin = |stage: Stage| {
            step += 1;
            info!("[{step}/{total}] {stage}");
        };

        begin(Stage::PrivilegeCheck);
        privilege::ensure_superuser(host.privileges.as_ref())
            .map_err(|e| e.in_stage(Stage::PrivilegeCheck))?;
        report.record(Stage::PrivilegeCheck, StageOutcome::Done);

        begin(Stage::ServiceStop);
        let outcome = service::stop(host.services.as_ref(), &self.unit_name())
            .map_err(|e| e.in_stage(Stage::ServiceStop))?;
        report.record(Stage::ServiceStop, outcome);

        begin(Stage::DependencyInstall);
        let outcome = crate::packages::ensure_packages(host.packages.as_ref(), &self.packages)
            .map_err(|e| e.in_stage(Stage::DependencyInstall))?;
        report.record(Stage::DependencyInstall, outcome);

        let state_path = self.install_dir.join(&self.state_file);
        let snapshot = if self.preserve_state {
            begin(Stage::StatePreservation);
            let snapshot = workspace::ensure_outside(&self.holding_dir, &self.install_dir)
                .and_then(|()| state::preserve(&state_path, &self.holding_dir))
                .map_err(|e| e.in_stage(Stage::StatePreservation))?;
            report.record(
                Stage::StatePreservation,
                if snapshot.is_empty() {
                    StageOutcome::NoOp(format!("no {} to preserve", self.state_file))
                } else {
                    StageOutcome::Done
                },
            );
            snapshot
        } else {
            StateSnapshot::empty()
        };

        begin(Stage::WorkspaceReset);
        if let Err(e) = workspace::reset(&self.install_dir, &self.source_dir) {
            let e = match snapshot.abandon() {
                Some(kept) => e.with_kept_state(&kept),
                None => e,
            };
            return Err(e.in_stage(Stage::WorkspaceReset));
        }
        report.record(Stage::WorkspaceReset, StageOutcome::Done);

        begin(Stage::FileDeployment);
        let deployed = workspace::deploy(&self.source_dir, &self.install_dir);

        // Put the state back even when deployment failed, the next
        // run will rebuild everything else.
        let restored = if self.preserve_state {
            begin(Stage::StateRestoration);
            Some(snapshot.restore(&state_path))
        } else {
            None
        };

        let files = deployed.map_err(|e| e.in_stage(Stage::FileDeployment))?;
        info!(files, dir = %self.install_dir.display(), "deployed source tree");
        if let Some(module) = &self.app_module {
            workspace::check_app_module(&self.install_dir, module);
        }
        report.record(Stage::FileDeployment, StageOutcome::Done);

        if let Some(restored) = restored {
            let restored = restored.map_err(|e| e.in_stage(Stage::StateRestoration))?;
            report.record(
                Stage::StateRestoration,
                if restored {
                    StageOutcome::Done
                } else {
                    StageOutcome::NoOp("nothing to restore".into())
                },
            );
        }

        begin(Stage::PythonEnvironment);
        self.build_environment()
            .map_err(|e| e.in_stage(Stage::PythonEnvironment))?;
        report.record(Stage::PythonEnvironment, StageOutcome::Done);

        if let Variant::Full { domain, email, .. } = &self.variant {
            begin(Stage::ReverseProxy);
            let site = self.site_source().ok_or_else(|| {
                ProvisionError::Other("full install without a site".into())
                    .in_stage(Stage::ReverseProxy)
            })?;
            proxy::configure(&self.sites, domain, &site, host.proxy.as_ref())
                .map_err(|e| e.in_stage(Stage::ReverseProxy))?;
            report.record(Stage::ReverseProxy, StageOutcome::Done);

            begin(Stage::Certificate);
            let outcome = certificate::issue_or_renew(host.acme.as_ref(), domain, email);
            report.record(Stage::Certificate, outcome);
        }

        begin(Stage::SupervisorInstall);
        let unit_name = self
            .install_unit()
            .map_err(|e| e.in_stage(Stage::SupervisorInstall))?;
        report.record(Stage::SupervisorInstall, StageOutcome::Done);

        begin(Stage::Verification);
        let status = host
            .services
            .status(&unit_name)
            .map_err(|e| e.in_stage(Stage::Verification))?;
        if status.is_running() {
            info!("{status}");
        } else {
            warn!("{status}");
        }
        report.status = Some(status);
        report.record(Stage::Verification, StageOutcome::Done);

        for warning in report.warnings() {
            warn!("{warning}");
        }
        info!("install of {} complete", self.service);
        Ok(report)
    }

    fn build_environment(&self) -> ProvisionResult<()> {
        let python = self.host.python.as_ref();
        let env = python.create_venv(&self.install_dir.join("venv"))?;
        python::install_requirements(python, &env, &self.resolve(&self.requirements))
    }

    fn install_unit(&self) -> ProvisionResult<String> {
        let def = self.unit_definition()?;
        unit::install_unit(&def, &self.unit_dir)?;

        let services = self.host.services.as_ref();
        services.daemon_reload()?;
        services.enable(&def.name)?;
        services.restart(&def.name)?;
        Ok(def.name)
    }

    /// Current status of the installed unit.
    pub fn status(&self) -> ProvisionResult<StatusReport> {
        self.host.services.status(&self.unit_name())
    }

    /// Everything an install would write, without touching the host.
    pub fn plan(&self) -> ProvisionResult<Plan> {
        let site = match self.site_source() {
            Some(SiteSource::Rendered(site)) => Some(site.render()),
            Some(SiteSource::File(path)) => Some(
                std::fs::read_to_string(&path)
                    .map_err(|_| ProvisionError::FileNotFound(path.display().to_string()))?,
            ),
            None => None,
        };

        Ok(Plan {
            stages: self.stages(),
            unit: self.unit_definition()?,
            site,
        })
    }

    /// Parse CLI arguments and dispatch the appropriate command.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatched command fails.
    pub fn run(self) -> ProvisionResult<()> {
        let cli = Cli::parse();

        match cli.command {
            None => self.cmd_install(false),
            Some(Command::Install {
                minimal,
                dry_run,
                domain,
                email,
            }) => {
                let mut installer = self.override_target(domain.as_deref(), email.as_deref());
                if minimal {
                    installer = installer.into_minimal();
                }
                installer.cmd_install(dry_run)
            }
            Some(Command::Plan) => self.cmd_install(true),
            Some(Command::Status { json }) => self.cmd_status(json),
        }
    }

    fn override_target(mut self, new_domain: Option<&str>, new_email: Option<&str>) -> Self {
        if let Variant::Full { domain, email, .. } = &mut self.variant {
            if let Some(d) = new_domain {
                *domain = d.to_string();
            }
            if let Some(e) = new_email {
                *email = e.to_string();
            }
        }
        self
    }

    /// Switch to the minimal flavour, using `<service>.service` from
    /// the source tree as the unit file.
    #[must_use]
    pub fn into_minimal(mut self) -> Self {
        if matches!(self.variant, Variant::Full { .. }) {
            self.variant = Variant::Minimal {
                unit_file: PathBuf::from(self.unit_name()),
            };
            self.packages = MINIMAL_PACKAGES.iter().map(ToString::to_string).collect();
        }
        self
    }

    fn cmd_install(&self, dry_run: bool) -> ProvisionResult<()> {
        if dry_run {
            return self.cmd_dry_run();
        }
        self.install().map(drop)
    }

    fn cmd_dry_run(&self) -> ProvisionResult<()> {
        let plan = self.plan()?;

        eprintln!("=== Dry run: no changes will be made ===");
        eprintln!();

        eprintln!("--- {} ---", plan.unit.name);
        println!("{}", plan.unit.contents);

        if let (Some(site), Variant::Full { domain, .. }) = (&plan.site, &self.variant) {
            eprintln!("--- {} ---", self.sites.available.join(domain).display());
            println!("{site}");
        }

        eprintln!("--- Stages that would run ---");
        for (i, stage) in plan.stages.iter().enumerate() {
            eprintln!("{}. {stage}", i + 1);
        }
        Ok(())
    }

    fn cmd_status(&self, json: bool) -> ProvisionResult<()> {
        let status = self.status()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!("{status}");
        }
        Ok(())
    }
}

/// Preview of an install.
#[derive(Debug, Clone)]
pub struct Plan {
    pub stages: Vec<Stage>,
    pub unit: UnitDefinition,
    pub site: Option<String>,
}

#[derive(Parser)]
#[command(name = "ancora")]
#[command(about = "Install the service on this host")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Install or reinstall the service (the default)
    Install {
        /// Skip nginx and TLS, use the unit file from the source tree
        #[arg(long)]
        minimal: bool,

        /// Preview generated files without executing
        #[arg(long)]
        dry_run: bool,

        /// Override the public domain
        #[arg(long)]
        domain: Option<String>,

        /// Override the ACME account email
        #[arg(long)]
        email: Option<String>,
    },

    /// Preview generated files without executing
    Plan,

    /// Show the service status
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}
