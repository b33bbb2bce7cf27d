pub mod nginx;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{ProvisionError, ProvisionResult};
use crate::site::SiteSource;
use crate::workspace;

/// Control plane of the running reverse proxy.
pub trait ProxyControl {
    /// Check the on-disk configuration. The error carries the
    /// validator's diagnostic.
    fn validate(&self) -> ProvisionResult<()>;

    /// Load the on-disk configuration into the running proxy.
    fn reload(&self) -> ProvisionResult<()>;
}

/// `sites-available` / `sites-enabled` layout used by Debian's nginx.
#[derive(Debug, Clone)]
pub struct SiteDirs {
    pub available: PathBuf,
    pub enabled: PathBuf,
}

impl SiteDirs {
    #[must_use]
    pub fn new(available: impl Into<PathBuf>, enabled: impl Into<PathBuf>) -> Self {
        Self {
            available: available.into(),
            enabled: enabled.into(),
        }
    }

    /// Layout under a common root, e.g. `/etc/nginx`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self::new(root.join("sites-available"), root.join("sites-enabled"))
    }
}

impl Default for SiteDirs {
    fn default() -> Self {
        Self::under(Path::new("/etc/nginx"))
    }
}

/// Remove the distribution's `default` site link if it is enabled.
pub fn disable_default_site(dirs: &SiteDirs) -> ProvisionResult<bool> {
    let link = dirs.enabled.join("default");
    if fs::symlink_metadata(&link).is_err() {
        return Ok(false);
    }
    fs::remove_file(&link)?;
    info!("disabled default nginx site");
    Ok(true)
}

/// What was on disk before this install touched the site, so a
/// failed validation can put it back.
#[derive(Debug)]
struct Previous {
    config: Option<Vec<u8>>,
    link: Option<PathBuf>,
    default: Option<Removed>,
}

/// The distribution's default site entry as it was before removal.
#[derive(Debug)]
enum Removed {
    Link(PathBuf),
    File(Vec<u8>),
}

/// Site config written to `sites-available`, not yet enabled.
#[derive(Debug)]
pub struct InstalledSite<'a> {
    domain: String,
    dirs: &'a SiteDirs,
    previous: Previous,
}

/// Site linked into `sites-enabled`, not yet validated.
#[derive(Debug)]
pub struct EnabledSite<'a> {
    site: InstalledSite<'a>,
}

/// Site that passed validation. Only this state can be reloaded.
#[derive(Debug)]
pub struct ValidatedSite<'a> {
    site: InstalledSite<'a>,
}

/// Write the site configuration for `domain` into `sites-available`
/// atomically.
pub fn install_site<'a>(
    dirs: &'a SiteDirs,
    domain: &str,
    source: &SiteSource,
) -> ProvisionResult<InstalledSite<'a>> {
    let target = dirs.available.join(domain);
    let link = dirs.enabled.join(domain);

    let previous = Previous {
        config: fs::read(&target).ok(),
        link: fs::read_link(&link).ok(),
        default: None,
    };

    let contents = match source {
        SiteSource::File(path) => {
            if !path.is_file() {
                return Err(ProvisionError::FileNotFound(path.display().to_string()));
            }
            fs::read(path)?
        }
        SiteSource::Rendered(site) => site.render().into_bytes(),
    };
    workspace::write_atomic(&target, &contents)?;
    info!(site = %target.display(), "installed nginx site");

    Ok(InstalledSite {
        domain: domain.to_string(),
        dirs,
        previous,
    })
}

impl<'a> InstalledSite<'a> {
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dirs.available.join(&self.domain)
    }

    #[must_use]
    pub fn link_path(&self) -> PathBuf {
        self.dirs.enabled.join(&self.domain)
    }

    /// Point `sites-enabled/<domain>` at the installed config,
    /// replacing whatever link was there.
    pub fn enable(self) -> ProvisionResult<EnabledSite<'a>> {
        let link = self.link_path();
        fs::create_dir_all(&self.dirs.enabled)?;
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link)?;
        }
        workspace::symlink(&self.config_path(), &link)?;
        Ok(EnabledSite { site: self })
    }

    fn rollback(&self) -> ProvisionResult<()> {
        let config = self.config_path();
        let link = self.link_path();

        match &self.previous.config {
            Some(bytes) => workspace::write_atomic(&config, bytes)?,
            None => {
                if config.exists() {
                    fs::remove_file(&config)?;
                }
            }
        }

        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link)?;
        }
        if let Some(target) = &self.previous.link {
            workspace::symlink(target, &link)?;
        }

        let default = self.dirs.enabled.join("default");
        if let Some(removed) = &self.previous.default {
            if fs::symlink_metadata(&default).is_err() {
                match removed {
                    Removed::Link(target) => workspace::symlink(target, &default)?,
                    Removed::File(bytes) => workspace::write_atomic(&default, bytes)?,
                }
                info!("restored default nginx site");
            }
        }
        Ok(())
    }
}

impl<'a> EnabledSite<'a> {
    /// Remove the default site so it cannot shadow this one. A failed
    /// validation puts it back.
    pub fn disable_default(mut self) -> ProvisionResult<Self> {
        let entry = self.site.dirs.enabled.join("default");
        let removed = match fs::read_link(&entry) {
            Ok(target) => Some(Removed::Link(target)),
            Err(_) => fs::read(&entry).ok().map(Removed::File),
        };
        if disable_default_site(self.site.dirs)? {
            self.site.previous.default = removed;
        }
        Ok(self)
    }

    /// Run the proxy's syntax check. On failure the site is rolled
    /// back to what was there before and the error is returned, so
    /// the invalid config can never reach `reload`.
    pub fn validate(self, proxy: &dyn ProxyControl) -> ProvisionResult<ValidatedSite<'a>> {
        match proxy.validate() {
            Ok(()) => Ok(ValidatedSite { site: self.site }),
            Err(e) => {
                warn!(domain = %self.site.domain, "nginx rejected the site, rolling back");
                if let Err(rollback) = self.site.rollback() {
                    warn!(error = %rollback, "rollback of nginx site failed");
                }
                Err(match e {
                    invalid @ ProvisionError::ProxyConfigInvalid(_) => invalid,
                    other => ProvisionError::ProxyConfigInvalid(other.to_string()),
                })
            }
        }
    }
}

impl ValidatedSite<'_> {
    pub fn reload(self, proxy: &dyn ProxyControl) -> ProvisionResult<()> {
        proxy.reload()?;
        info!(domain = %self.site.domain, "nginx reloaded");
        Ok(())
    }
}

/// Install, enable, validate and reload in one go. The default site
/// is disabled before validation and restored if validation fails.
pub fn configure(
    dirs: &SiteDirs,
    domain: &str,
    source: &SiteSource,
    proxy: &dyn ProxyControl,
) -> ProvisionResult<()> {
    let installed = install_site(dirs, domain, source)?;
    let enabled = installed.enable()?.disable_default()?;
    enabled.validate(proxy)?.reload(proxy)
}
