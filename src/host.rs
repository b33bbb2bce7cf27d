use crate::certificate::AcmeClient;
use crate::certificate::certbot::Certbot;
use crate::packages::PackageManager;
use crate::packages::apt::Apt;
use crate::privilege::{Privileges, ProcessPrivileges};
use crate::proxy::ProxyControl;
use crate::proxy::nginx::Nginx;
use crate::python::PythonRuntime;
use crate::python::venv::SystemPython;
use crate::service::ServiceManager;
use crate::service::systemd::Systemd;

/// Everything the installer needs from the machine it runs on.
/// Swap any piece for a fake to run the workflow without touching a
/// real host.
pub struct HostEnvironment {
    pub privileges: Box<dyn Privileges>,
    pub packages: Box<dyn PackageManager>,
    pub services: Box<dyn ServiceManager>,
    pub python: Box<dyn PythonRuntime>,
    pub proxy: Box<dyn ProxyControl>,
    pub acme: Box<dyn AcmeClient>,
}

impl HostEnvironment {
    /// Debian/Ubuntu host: apt, systemd, python3, nginx, certbot.
    #[must_use]
    pub fn system() -> Self {
        Self {
            privileges: Box::new(ProcessPrivileges),
            packages: Box::new(Apt::new()),
            services: Box::new(Systemd::new()),
            python: Box::new(SystemPython::new()),
            proxy: Box::new(Nginx::new()),
            acme: Box::new(Certbot::new()),
        }
    }

    #[must_use]
    pub fn privileges(mut self, privileges: impl Privileges + 'static) -> Self {
        self.privileges = Box::new(privileges);
        self
    }

    #[must_use]
    pub fn packages(mut self, manager: impl PackageManager + 'static) -> Self {
        self.packages = Box::new(manager);
        self
    }

    #[must_use]
    pub fn services(mut self, manager: impl ServiceManager + 'static) -> Self {
        self.services = Box::new(manager);
        self
    }

    #[must_use]
    pub fn python(mut self, runtime: impl PythonRuntime + 'static) -> Self {
        self.python = Box::new(runtime);
        self
    }

    #[must_use]
    pub fn proxy(mut self, control: impl ProxyControl + 'static) -> Self {
        self.proxy = Box::new(control);
        self
    }

    #[must_use]
    pub fn acme(mut self, client: impl AcmeClient + 'static) -> Self {
        self.acme = Box::new(client);
        self
    }
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self::system()
    }
}
