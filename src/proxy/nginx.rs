use crate::cmd;
use crate::error::{ProvisionError, ProvisionResult};
use crate::proxy::ProxyControl;

/// The host's nginx, checked with `nginx -t` and reloaded through
/// systemd.
#[derive(Debug, Clone)]
pub struct Nginx {
    pub unit: String,
}

impl Nginx {
    #[must_use]
    pub fn new() -> Self {
        Self {
            unit: "nginx".to_string(),
        }
    }
}

impl Default for Nginx {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyControl for Nginx {
    fn validate(&self) -> ProvisionResult<()> {
        // nginx -t reports on stderr for both outcomes.
        let probe = cmd::probe("nginx", &["-t"])?;
        if probe.success {
            Ok(())
        } else {
            Err(ProvisionError::ProxyConfigInvalid(probe.stderr))
        }
    }

    fn reload(&self) -> ProvisionResult<()> {
        cmd::run("systemctl", &["reload-or-restart", &self.unit]).map(drop)
    }
}
