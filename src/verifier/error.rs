use thiserror::Error;

use crate::mx::MxError;

/// Errors raised while building a [`Verifier`](super::Verifier). Verifying an
/// address never fails.
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Mx(#[from] MxError),
}

impl VerifierError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
