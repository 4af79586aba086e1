use std::net::IpAddr;
use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::error::VerifierError;
use crate::smtp_verify::ProbeOptions;

/// Everything a [`Verifier`](super::Verifier) needs; fixed once the verifier
/// is built.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Reverse-path announced in `MAIL FROM`. Empty means `<>`.
    pub sender_address: String,
    /// Name announced in `EHLO`/`HELO`.
    pub helo_name: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub dns_timeout: Duration,
    /// Addresses verified at the same time by a batch.
    pub max_concurrent_addresses: usize,
    /// Probe at most this many exchangers per address; `None` tries them all.
    pub max_hosts: Option<usize>,
    /// Resolvers to query instead of the system configuration.
    pub nameservers: Vec<IpAddr>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let probe = ProbeOptions::default();
        Self {
            sender_address: probe.sender_address,
            helo_name: probe.helo_name,
            port: probe.port,
            connect_timeout: probe.connect_timeout,
            command_timeout: probe.command_timeout,
            dns_timeout: Duration::from_secs(5),
            max_concurrent_addresses: 16,
            max_hosts: None,
            nameservers: Vec::new(),
        }
    }
}

impl VerifierConfig {
    pub fn validate(&self) -> Result<(), VerifierError> {
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("command_timeout", self.command_timeout),
            ("dns_timeout", self.dns_timeout),
        ] {
            if value.is_zero() {
                return Err(VerifierError::invalid_config(format!("{name} must be positive")));
            }
        }
        if self.max_concurrent_addresses == 0 {
            return Err(VerifierError::invalid_config(
                "max_concurrent_addresses must be at least 1",
            ));
        }
        if self.max_hosts == Some(0) {
            return Err(VerifierError::invalid_config("max_hosts must be at least 1"));
        }
        if self.helo_name.trim().is_empty() {
            return Err(VerifierError::invalid_config("helo_name is empty"));
        }
        if self.helo_name.contains(char::is_whitespace) {
            return Err(VerifierError::invalid_config(format!(
                "helo_name contains whitespace: {:?}",
                self.helo_name
            )));
        }
        if self.sender_address.contains(char::is_whitespace) {
            return Err(VerifierError::invalid_config(format!(
                "sender_address contains whitespace: {:?}",
                self.sender_address
            )));
        }
        Ok(())
    }
}

impl From<&VerifierConfig> for ProbeOptions {
    fn from(config: &VerifierConfig) -> Self {
        Self {
            helo_name: config.helo_name.clone(),
            sender_address: config.sender_address.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = VerifierConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sender_address, "test@example.com");
        assert_eq!(config.helo_name, "test.com");
        assert_eq!(config.dns_timeout, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_addresses, 16);
    }

    #[test]
    fn rejects_zero_timeouts_and_concurrency() {
        let zero_timeout = VerifierConfig {
            command_timeout: Duration::ZERO,
            ..VerifierConfig::default()
        };
        assert!(matches!(
            zero_timeout.validate(),
            Err(VerifierError::InvalidConfig(msg)) if msg.contains("command_timeout")
        ));

        let no_workers = VerifierConfig {
            max_concurrent_addresses: 0,
            ..VerifierConfig::default()
        };
        assert!(no_workers.validate().is_err());
    }

    #[test]
    fn rejects_command_injection_in_identity() {
        let helo = VerifierConfig {
            helo_name: "test.com\r\nRSET".to_string(),
            ..VerifierConfig::default()
        };
        assert!(helo.validate().is_err());

        let sender = VerifierConfig {
            sender_address: "a@b.c\r\nDATA".to_string(),
            ..VerifierConfig::default()
        };
        assert!(sender.validate().is_err());
    }

    #[test]
    fn empty_sender_is_allowed() {
        let config = VerifierConfig {
            sender_address: String::new(),
            ..VerifierConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(ProbeOptions::from(&config).mail_from_command(), "MAIL FROM:<>");
    }
}
