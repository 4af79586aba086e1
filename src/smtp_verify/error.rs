use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use super::types::AttemptStage;

/// Failures inside one SMTP session. The prober turns every one of them into
/// [`ProbeOutcome::Unreachable`](super::ProbeOutcome::Unreachable).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no socket address for {host}")]
    NoAddress { host: String },
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: AttemptStage, after: Duration },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("connection closed by server")]
    Closed,
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}
