#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ancora::certificate::AcmeClient;
use ancora::packages::PackageManager;
use ancora::privilege::Privileges;
use ancora::proxy::ProxyControl;
use ancora::python::{PythonRuntime, VirtualEnv};
use ancora::service::{ServiceManager, StatusReport};
use ancora::{HostEnvironment, Installer, ProvisionError, ProvisionResult, SiteDirs};
use tempfile::TempDir;

pub type Journal = Rc<RefCell<Vec<String>>>;

pub struct FakePrivileges(pub bool);

impl Privileges for FakePrivileges {
    fn is_superuser(&self) -> bool {
        self.0
    }
}

pub struct FakePackages {
    pub journal: Journal,
    pub installed: Rc<RefCell<BTreeSet<String>>>,
}

impl PackageManager for FakePackages {
    fn refresh_index(&self) -> ProvisionResult<()> {
        self.journal.borrow_mut().push("apt update".into());
        Ok(())
    }

    fn is_installed(&self, name: &str) -> ProvisionResult<bool> {
        Ok(self.installed.borrow().contains(name))
    }

    fn install(&self, names: &[&str]) -> ProvisionResult<()> {
        self.journal
            .borrow_mut()
            .push(format!("apt install {}", names.join(" ")));
        self.installed
            .borrow_mut()
            .extend(names.iter().map(ToString::to_string));
        Ok(())
    }
}

pub struct FakeServices {
    pub journal: Journal,
    pub unit_dir: PathBuf,
    pub active: Rc<RefCell<BTreeSet<String>>>,
}

impl ServiceManager for FakeServices {
    fn stop(&self, unit: &str) -> ProvisionResult<()> {
        self.journal.borrow_mut().push(format!("stop {unit}"));
        self.active.borrow_mut().remove(unit);
        Ok(())
    }

    fn restart(&self, unit: &str) -> ProvisionResult<()> {
        if !self.unit_dir.join(unit).is_file() {
            return Err(ProvisionError::Other(format!("unit {unit} not found")));
        }
        self.journal.borrow_mut().push(format!("restart {unit}"));
        self.active.borrow_mut().insert(unit.to_string());
        Ok(())
    }

    fn enable(&self, unit: &str) -> ProvisionResult<()> {
        self.journal.borrow_mut().push(format!("enable {unit}"));
        Ok(())
    }

    fn daemon_reload(&self) -> ProvisionResult<()> {
        self.journal.borrow_mut().push("daemon-reload".into());
        Ok(())
    }

    fn status(&self, unit: &str) -> ProvisionResult<StatusReport> {
        if self.active.borrow().contains(unit) {
            Ok(StatusReport {
                unit: unit.to_string(),
                load_state: "loaded".into(),
                active_state: "active".into(),
                sub_state: "running".into(),
            })
        } else {
            Ok(StatusReport::not_found(unit))
        }
    }
}

/// Records pip calls; `install -r` pins whatever the requirements
/// file declares into `<venv>/installed.txt`, which `freeze` reads.
pub struct FakePython {
    pub journal: Journal,
}

impl PythonRuntime for FakePython {
    fn create_venv(&self, dir: &Path) -> ProvisionResult<VirtualEnv> {
        self.journal
            .borrow_mut()
            .push(format!("venv {}", dir.display()));
        fs::create_dir_all(dir.join("bin"))?;
        fs::write(dir.join("bin").join("python"), "#!/bin/sh\n")?;
        Ok(VirtualEnv::new(dir))
    }

    fn pip(&self, env: &VirtualEnv, args: &[&str]) -> ProvisionResult<()> {
        self.journal
            .borrow_mut()
            .push(format!("pip {}", args.join(" ")));
        if let ["install", "-r", file] = args {
            let reqs = fs::read_to_string(file)?;
            fs::write(env.root.join("installed.txt"), reqs)?;
        }
        Ok(())
    }

    fn freeze(&self, env: &VirtualEnv) -> ProvisionResult<String> {
        Ok(fs::read_to_string(env.root.join("installed.txt")).unwrap_or_default())
    }
}

/// Rejects any enabled site containing `CORRUPT`.
pub struct FakeProxy {
    pub journal: Journal,
    pub enabled: PathBuf,
}

impl ProxyControl for FakeProxy {
    fn validate(&self) -> ProvisionResult<()> {
        self.journal.borrow_mut().push("nginx -t".into());
        for entry in fs::read_dir(&self.enabled)? {
            let text = fs::read_to_string(entry?.path())?;
            if text.contains("CORRUPT") {
                return Err(ProvisionError::ProxyConfigInvalid(
                    "unknown directive \"CORRUPT\"".into(),
                ));
            }
        }
        Ok(())
    }

    fn reload(&self) -> ProvisionResult<()> {
        self.journal.borrow_mut().push("nginx reload".into());
        Ok(())
    }
}

pub struct FakeAcme {
    pub journal: Journal,
    pub fail: bool,
}

impl AcmeClient for FakeAcme {
    fn obtain(&self, domain: &str, _email: &str) -> ProvisionResult<()> {
        self.journal.borrow_mut().push(format!("certbot {domain}"));
        if self.fail {
            Err(ProvisionError::Other("connection refused".into()))
        } else {
            Ok(())
        }
    }

    fn remedy(&self, domain: &str, email: &str) -> String {
        format!("certbot --nginx -d {domain} -m {email}")
    }
}

/// A scratch host: source tree, install dir, unit dir and nginx dirs
/// all under one temp directory, plus the shared fake state.
pub struct Sandbox {
    pub root: TempDir,
    pub journal: Journal,
    pub installed_packages: Rc<RefCell<BTreeSet<String>>>,
    pub active_units: Rc<RefCell<BTreeSet<String>>>,
    pub acme_fails: bool,
    pub superuser: bool,
}

pub const SERVICE: &str = "tradingalert";
pub const DOMAIN: &str = "alerts.example.com";

impl Sandbox {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        fs::create_dir_all(src.join("static")).unwrap();
        fs::create_dir_all(src.join(".git")).unwrap();
        fs::write(src.join("webapp.py"), "def create_app():\n    pass\n").unwrap();
        fs::write(src.join("requirements.txt"), "Flask==3.0.0\ngunicorn==22.0.0\n").unwrap();
        fs::write(
            src.join("nginx_app.conf"),
            "server {\n    listen 80;\n    server_name alerts.example.com;\n}\n",
        )
        .unwrap();
        fs::write(
            src.join("tradingalert.service"),
            "[Service]\nWorkingDirectory=/opt/tradingalert\n\
             ExecStart=/opt/tradingalert/venv/bin/gunicorn 'webapp:create_app()'\n\
             Restart=always\nRestartSec=10\n",
        )
        .unwrap();
        fs::write(src.join("static").join("app.js"), "console.log(1);\n").unwrap();
        fs::write(src.join(".git").join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let nginx = root.path().join("etc/nginx");
        fs::create_dir_all(nginx.join("sites-available")).unwrap();
        fs::create_dir_all(nginx.join("sites-enabled")).unwrap();
        fs::write(nginx.join("sites-available/default"), "server {}\n").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(
            nginx.join("sites-available/default"),
            nginx.join("sites-enabled/default"),
        )
        .unwrap();

        Self {
            root,
            journal: Rc::default(),
            installed_packages: Rc::default(),
            active_units: Rc::default(),
            acme_fails: false,
            superuser: true,
        }
    }

    pub fn src(&self) -> PathBuf {
        self.root.path().join("src")
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root.path().join("opt").join(SERVICE)
    }

    pub fn unit_dir(&self) -> PathBuf {
        self.root.path().join("etc/systemd/system")
    }

    pub fn sites(&self) -> SiteDirs {
        SiteDirs::under(&self.root.path().join("etc/nginx"))
    }

    pub fn hold_dir(&self) -> PathBuf {
        self.root.path().join("hold")
    }

    pub fn host(&self) -> HostEnvironment {
        HostEnvironment::system()
            .privileges(FakePrivileges(self.superuser))
            .packages(FakePackages {
                journal: Rc::clone(&self.journal),
                installed: Rc::clone(&self.installed_packages),
            })
            .services(FakeServices {
                journal: Rc::clone(&self.journal),
                unit_dir: self.unit_dir(),
                active: Rc::clone(&self.active_units),
            })
            .python(FakePython {
                journal: Rc::clone(&self.journal),
            })
            .proxy(FakeProxy {
                journal: Rc::clone(&self.journal),
                enabled: self.sites().enabled,
            })
            .acme(FakeAcme {
                journal: Rc::clone(&self.journal),
                fail: self.acme_fails,
            })
    }

    pub fn wire(&self, installer: Installer) -> Installer {
        installer
            .install_dir(self.install_dir())
            .source_dir(self.src())
            .unit_dir(self.unit_dir())
            .sites(self.sites())
            .holding_dir(self.hold_dir())
            .host(self.host())
    }

    pub fn full(&self) -> Installer {
        self.wire(Installer::full(SERVICE, DOMAIN, "ops@example.com"))
    }

    pub fn minimal(&self) -> Installer {
        self.wire(Installer::minimal(SERVICE, "tradingalert.service"))
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.journal.borrow_mut().clear();
    }

    pub fn has_call(&self, call: &str) -> bool {
        self.journal.borrow().iter().any(|c| c == call)
    }

    /// Relative path -> contents (or link target) for every file the
    /// installer produces.
    pub fn produced_files(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        for dir in [
            self.install_dir(),
            self.unit_dir(),
            self.root.path().join("etc/nginx"),
        ] {
            collect(self.root.path(), &dir, &mut files);
        }
        files
    }

    /// Every path under the sandbox root, for detecting mutations.
    pub fn all_paths(&self) -> BTreeSet<PathBuf> {
        let mut files = BTreeMap::new();
        collect(self.root.path(), self.root.path(), &mut files);
        files.into_keys().map(PathBuf::from).collect()
    }
}

fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        let rel = path.strip_prefix(root).unwrap().display().to_string();
        let meta = fs::symlink_metadata(&path).unwrap();
        if meta.file_type().is_symlink() {
            out.insert(rel, format!("-> {}", fs::read_link(&path).unwrap().display()));
        } else if meta.is_dir() {
            out.insert(rel, "<dir>".into());
            collect(root, &path, out);
        } else {
            out.insert(rel, fs::read_to_string(&path).unwrap_or_default());
        }
    }
}
