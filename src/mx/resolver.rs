use std::collections::HashSet;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, warn};
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;

use super::{LookupFailure, MxError, MxHost};

/// Source of raw MX answers. Records come back in whatever order the
/// lookup produced them; [`MxResolver`] does the ordering.
pub trait MxLookup: Send + Sync {
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxHost>, LookupFailure>> + Send;
}

impl MxLookup for TokioAsyncResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxHost>, LookupFailure> {
        // FQDN: pas de liste de recherche
        let fqdn = format!("{domain}.");
        let lookup = self.mx_lookup(fqdn.as_str()).await.map_err(classify)?;
        Ok(lookup
            .iter()
            .map(|mx| MxHost::new(mx.preference(), mx.exchange().to_utf8()))
            .collect())
    }
}

pub(crate) fn classify(err: ResolveError) -> LookupFailure {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            LookupFailure::NxDomain
        }
        ResolveErrorKind::NoRecordsFound { .. } => LookupFailure::NoRecords,
        ResolveErrorKind::Timeout => LookupFailure::Timeout,
        _ => LookupFailure::Other(err.to_string()),
    }
}

/// Build an async resolver with an explicit per-query timeout.
///
/// An empty `nameservers` list means the system configuration
/// (`/etc/resolv.conf` or the platform equivalent).
pub fn build_resolver(
    timeout: Duration,
    nameservers: &[IpAddr],
) -> Result<TokioAsyncResolver, MxError> {
    let (config, mut opts) = if nameservers.is_empty() {
        trust_dns_resolver::system_conf::read_system_conf().map_err(MxError::resolver_init)?
    } else {
        let group = NameServerConfigGroup::from_ips_clear(nameservers, 53, true);
        (
            ResolverConfig::from_parts(None, Vec::new(), group),
            ResolverOpts::default(),
        )
    };
    opts.timeout = timeout;
    Ok(TokioAsyncResolver::tokio(config, opts))
}

/// Turns a domain into its mail exchangers, most preferred first.
#[derive(Debug, Clone)]
pub struct MxResolver<L> {
    lookup: L,
    timeout: Duration,
}

impl<L: MxLookup> MxResolver<L> {
    pub fn new(lookup: L, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `domain` to its MX hosts in ascending preference order.
    ///
    /// Returns an empty list when the domain has no usable MX record, does not
    /// exist, times out or the lookup fails for any other reason.
    pub async fn resolve_mx(&self, domain: &str) -> Vec<MxHost> {
        let Some(ascii) = normalize_domain(domain) else {
            debug!(domain, "domain cannot be converted to ASCII");
            return Vec::new();
        };

        let answer = match tokio::time::timeout(self.timeout, self.lookup.lookup_mx(&ascii)).await
        {
            Ok(answer) => answer,
            Err(_) => Err(LookupFailure::Timeout),
        };

        match answer {
            Ok(records) => {
                let hosts = order_hosts(records);
                debug!(domain = %ascii, hosts = hosts.len(), "MX lookup");
                hosts
            }
            Err(failure) if failure.is_expected() => {
                debug!(domain = %ascii, %failure, "no mail exchangers");
                Vec::new()
            }
            Err(failure) => {
                warn!(domain = %ascii, %failure, "MX resolution failed");
                Vec::new()
            }
        }
    }
}

/// Normalise, drop null MX entries and duplicates, then sort by preference.
/// The sort is stable, so equal preferences keep the lookup order.
pub(crate) fn order_hosts(records: Vec<MxHost>) -> Vec<MxHost> {
    let mut hosts: Vec<MxHost> = records
        .into_iter()
        .map(|record| MxHost::new(record.preference, normalize_exchange(&record.exchange)))
        .filter(|record| !record.exchange.is_empty())
        .collect();

    hosts.sort_by_key(|record| record.preference);

    let mut seen = HashSet::new();
    hosts.retain(|record| seen.insert(record.exchange.clone()));
    hosts
}

pub(crate) fn normalize_domain(domain: &str) -> Option<String> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    idna::domain_to_ascii(trimmed).ok().filter(|ascii| !ascii.is_empty())
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}
