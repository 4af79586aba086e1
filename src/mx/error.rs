use thiserror::Error;

/// Fatal resolver errors. Only construction can fail; lookups degrade.
#[derive(Debug, Error)]
pub enum MxError {
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MxError {
    pub(crate) fn resolver_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ResolverInit {
            source: source.into(),
        }
    }
}

/// Why an MX lookup produced no answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupFailure {
    #[error("no MX records")]
    NoRecords,
    #[error("domain does not exist")]
    NxDomain,
    #[error("lookup timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}

impl LookupFailure {
    /// `NoRecords`, `NxDomain` and `Timeout` are ordinary answers for a
    /// deliverability probe and are not worth a warning.
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}
