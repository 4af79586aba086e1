use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::mx::MxHost;
use crate::smtp_verify::{ProbeOutcome, ServerAttempt};

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Valid,
    Invalid,
}

/// Why an address was classified [`VerdictStatus::Invalid`].
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The syntax check failed; nothing was queried.
    Malformed,
    /// The domain has no usable mail exchanger (or resolution failed).
    NoMailExchangers,
    /// At least one host answered `RCPT TO` negatively; the first such reply.
    Rejected { code: u16, message: String },
    /// No host got as far as answering `RCPT TO`.
    Unreachable,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("malformed address"),
            Self::NoMailExchangers => f.write_str("no mail exchangers"),
            Self::Rejected { code, message } if message.is_empty() => {
                write!(f, "rejected ({code})")
            }
            Self::Rejected { code, message } => {
                let first = message.lines().next().unwrap_or_default();
                write!(f, "rejected ({code} {first})")
            }
            Self::Unreachable => f.write_str("all servers unreachable"),
        }
    }
}

/// Final result for one address.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub address: String,
    pub status: VerdictStatus,
    pub reason: Option<InvalidReason>,
    pub mx_hosts: Vec<MxHost>,
    pub attempts: Vec<ServerAttempt>,
}

impl Verdict {
    pub(crate) fn valid(address: &str, mx_hosts: Vec<MxHost>, attempts: Vec<ServerAttempt>) -> Self {
        Self {
            address: address.to_string(),
            status: VerdictStatus::Valid,
            reason: None,
            mx_hosts,
            attempts,
        }
    }

    pub(crate) fn invalid(
        address: &str,
        reason: InvalidReason,
        mx_hosts: Vec<MxHost>,
        attempts: Vec<ServerAttempt>,
    ) -> Self {
        Self {
            address: address.to_string(),
            status: VerdictStatus::Invalid,
            reason: Some(reason),
            mx_hosts,
            attempts,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == VerdictStatus::Valid
    }

    /// Hosts actually probed, in probing order.
    pub fn hosts_tried(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.exchange.as_str()).collect()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.reason) {
            (VerdictStatus::Valid, _) => write!(f, "{} -> VALID", self.address),
            (VerdictStatus::Invalid, Some(reason)) => {
                write!(f, "{} -> INVALID ({reason})", self.address)
            }
            (VerdictStatus::Invalid, None) => write!(f, "{} -> INVALID", self.address),
        }
    }
}

/// Reduce failed attempts to one reason: a definitive rejection wins over
/// unreachable hosts.
pub(crate) fn exhausted_reason(attempts: &[ServerAttempt]) -> InvalidReason {
    attempts
        .iter()
        .find_map(|attempt| match &attempt.outcome {
            ProbeOutcome::Rejected { reply } => Some(InvalidReason::Rejected {
                code: reply.code,
                message: reply.message.clone(),
            }),
            _ => None,
        })
        .unwrap_or(InvalidReason::Unreachable)
}
