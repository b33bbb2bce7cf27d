//! Installer for the `tradingalert` web service.
//!
//! ```sh
//! # Full install: packages, venv, nginx, TLS, systemd
//! sudo ancora
//!
//! # Without nginx/TLS, using ./tradingalert.service
//! sudo ancora install --minimal
//!
//! # Preview the generated unit and site
//! ancora plan
//! ```

use ancora::Installer;
use tracing_subscriber::{EnvFilter, fmt};

const SERVICE: &str = "tradingalert";
const DOMAIN: &str = "tradingalert.example.com";
const EMAIL: &str = "admin@example.com";

fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Installer::full(SERVICE, DOMAIN, EMAIL).run()?;
    Ok(())
}
