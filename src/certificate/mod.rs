pub mod certbot;

use tracing::{info, warn};

use crate::error::{ProvisionError, ProvisionResult};
use crate::stage::StageOutcome;

/// An ACME client that can obtain or renew a certificate for a
/// domain and wire it into the reverse proxy.
pub trait AcmeClient {
    /// Request or renew the certificate, non-interactively.
    fn obtain(&self, domain: &str, email: &str) -> ProvisionResult<()>;

    /// The command an operator can run to retry by hand.
    fn remedy(&self, domain: &str, email: &str) -> String;
}

/// Request or renew the certificate for `domain`. Failure is turned
/// into an advisory carrying the manual remedy; the service keeps
/// running over plain HTTP until the operator fixes it.
#[must_use]
pub fn issue_or_renew(client: &dyn AcmeClient, domain: &str, email: &str) -> StageOutcome {
    match client.obtain(domain, email) {
        Ok(()) => {
            info!(%domain, "certificate in place");
            StageOutcome::Done
        }
        Err(e) => {
            let err = match e {
                cert @ ProvisionError::Certificate { .. } => cert,
                other => ProvisionError::Certificate {
                    domain: domain.to_string(),
                    reason: other.to_string(),
                },
            };
            let message = format!(
                "{err}. Check that DNS for {domain} points at this host and \
                 port 80 is reachable, then run: {}",
                client.remedy(domain, email)
            );
            warn!("{message}");
            StageOutcome::Advisory(message)
        }
    }
}
