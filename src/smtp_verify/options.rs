use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Identity and deadlines used by [`SmtpProber`](super::SmtpProber).
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub helo_name: String,
    pub sender_address: String,
    pub port: u16,
    /// Budget for address lookup, TCP connect and the server greeting.
    pub connect_timeout: Duration,
    /// Deadline for each command write and reply read after the greeting.
    pub command_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            helo_name: "test.com".to_string(),
            sender_address: "test@example.com".to_string(),
            port: 25,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
        }
    }
}

impl ProbeOptions {
    /// `MAIL FROM` command; an empty sender is the null reverse-path `<>`.
    pub fn mail_from_command(&self) -> String {
        format!("MAIL FROM:<{}>", self.sender_address.trim())
    }

    pub fn ehlo_command(&self) -> String {
        format!("EHLO {}", self.helo_name)
    }

    pub fn helo_command(&self) -> String {
        format!("HELO {}", self.helo_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sender_uses_null_reverse_path() {
        let options = ProbeOptions {
            sender_address: String::new(),
            ..ProbeOptions::default()
        };
        assert_eq!(options.mail_from_command(), "MAIL FROM:<>");
    }

    #[test]
    fn default_identity() {
        let options = ProbeOptions::default();
        assert_eq!(options.ehlo_command(), "EHLO test.com");
        assert_eq!(options.mail_from_command(), "MAIL FROM:<test@example.com>");
        assert_eq!(options.port, 25);
    }
}
