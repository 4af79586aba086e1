//! Orchestration: syntax check, MX resolution, then SMTP probing of each
//! exchanger in preference order until one accepts the recipient.

mod batch;
mod error;
mod options;
mod types;


pub use batch::{BatchItem, BatchOutcome};
pub use error::VerifierError;
pub use options::VerifierConfig;
pub use types::{InvalidReason, Verdict, VerdictStatus};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trust_dns_resolver::TokioAsyncResolver;

use crate::mx::{MxLookup, MxResolver, build_resolver};
use crate::smtp_verify::{HostProber, SmtpProber};
use crate::validator::EmailAddress;
use types::exhausted_reason;

/// Verifies addresses against their domain's mail exchangers.
///
/// Holds no per-address state; one instance can serve many concurrent
/// verifications, for example behind an [`Arc`](std::sync::Arc) with
/// [`Verifier::spawn_batch`].
pub struct Verifier<L = TokioAsyncResolver, P = SmtpProber> {
    resolver: MxResolver<L>,
    prober: P,
    max_hosts: Option<usize>,
    max_concurrent: usize,
}

impl Verifier {
    /// Build a verifier backed by the system (or configured) DNS resolvers
    /// and a TCP [`SmtpProber`].
    pub fn from_config(config: &VerifierConfig) -> Result<Self, VerifierError> {
        config.validate()?;
        let lookup = build_resolver(config.dns_timeout, &config.nameservers)?;
        Self::with_parts(config, lookup, SmtpProber::new(config.into()))
    }
}

impl<L, P> Verifier<L, P>
where
    L: MxLookup,
    P: HostProber,
{
    /// Build a verifier from explicit lookup and probe implementations.
    pub fn with_parts(config: &VerifierConfig, lookup: L, prober: P) -> Result<Self, VerifierError> {
        config.validate()?;
        Ok(Self {
            resolver: MxResolver::new(lookup, config.dns_timeout),
            prober,
            max_hosts: config.max_hosts,
            max_concurrent: config.max_concurrent_addresses,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Verify one address. Never fails: every problem ends up as an
    /// [`InvalidReason`].
    pub async fn verify(&self, address: &str) -> Verdict {
        let email = match EmailAddress::parse(address) {
            Ok(email) => email,
            Err(err) => {
                debug!(address, error = %err, "syntax check failed");
                return Verdict::invalid(address, InvalidReason::Malformed, Vec::new(), Vec::new());
            }
        };

        let hosts = self.resolver.resolve_mx(email.domain()).await;
        if hosts.is_empty() {
            info!(address, domain = email.domain(), "no mail exchangers");
            return Verdict::invalid(
                address,
                InvalidReason::NoMailExchangers,
                hosts,
                Vec::new(),
            );
        }

        let limit = self.max_hosts.unwrap_or(hosts.len());
        let mut attempts = Vec::new();
        for host in hosts.iter().take(limit) {
            let attempt = self.prober.probe(&host.exchange, &email).await;
            debug!(address, exchange = %host.exchange, outcome = %attempt.outcome, "probe result");
            let accepted = attempt.outcome.is_accepted();
            attempts.push(attempt);
            if accepted {
                info!(address, exchange = %host.exchange, "recipient accepted");
                return Verdict::valid(address, hosts, attempts);
            }
        }

        let reason = exhausted_reason(&attempts);
        info!(address, tried = attempts.len(), %reason, "no exchanger accepted the recipient");
        Verdict::invalid(address, reason, hosts, attempts)
    }

    /// Like [`verify`](Self::verify), but gives up as soon as `cancel` fires.
    /// An open SMTP session is dropped, which closes its socket.
    pub async fn verify_cancellable(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Option<Verdict> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(address, "verification cancelled");
                None
            }
            verdict = self.verify(address) => Some(verdict),
        }
    }
}
