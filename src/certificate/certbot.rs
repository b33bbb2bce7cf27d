use crate::certificate::AcmeClient;
use crate::cmd;
use crate::error::{ProvisionError, ProvisionResult};

/// Proxy integration used by certbot to answer the challenge and
/// install the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertbotPlugin {
    Nginx,
    Standalone,
}

impl CertbotPlugin {
    const fn flag(self) -> &'static str {
        match self {
            Self::Nginx => "--nginx",
            Self::Standalone => "--standalone",
        }
    }
}

/// Let's Encrypt via `certbot`.
#[derive(Debug, Clone)]
pub struct Certbot {
    pub plugin: CertbotPlugin,
    pub redirect: bool,
}

impl Certbot {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            plugin: CertbotPlugin::Nginx,
            redirect: false,
        }
    }

    #[must_use]
    pub const fn plugin(mut self, plugin: CertbotPlugin) -> Self {
        self.plugin = plugin;
        self
    }

    /// Have certbot rewrite the site to redirect HTTP to HTTPS.
    #[must_use]
    pub const fn redirect(mut self) -> Self {
        self.redirect = true;
        self
    }

    #[must_use]
    pub fn args<'a>(&self, domain: &'a str, email: &'a str) -> Vec<&'a str> {
        let mut args = vec![
            self.plugin.flag(),
            "-d",
            domain,
            "--non-interactive",
            "--agree-tos",
            "-m",
            email,
        ];
        if self.redirect {
            args.push("--redirect");
        }
        args
    }
}

impl Default for Certbot {
    fn default() -> Self {
        Self::new()
    }
}

impl AcmeClient for Certbot {
    fn obtain(&self, domain: &str, email: &str) -> ProvisionResult<()> {
        if !cmd::command_exists("certbot") {
            return Err(ProvisionError::Certificate {
                domain: domain.to_string(),
                reason: "certbot is not installed".into(),
            });
        }
        cmd::run_interactive("certbot", &self.args(domain, email))
    }

    fn remedy(&self, domain: &str, email: &str) -> String {
        cmd::format_command("certbot", &self.args(domain, email))
    }
}
