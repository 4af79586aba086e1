use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::is_valid_syntax;

/// A syntactically valid address split at its only `@`.
///
/// Built fresh for each verification and never mutated.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    local: String,
    domain: String,
}

impl EmailAddress {
    pub fn parse(input: &str) -> Result<Self, SyntaxError> {
        if !is_valid_syntax(input) {
            return Err(SyntaxError::Malformed {
                input: input.to_string(),
            });
        }
        // le motif garantit un seul '@'
        let (local, domain) = input.split_once('@').ok_or_else(|| SyntaxError::Malformed {
            input: input.to_string(),
        })?;
        Ok(Self {
            local: local.to_string(),
            domain: domain.to_string(),
        })
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl FromStr for EmailAddress {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("malformed address '{input}'")]
    Malformed { input: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_local_and_domain() {
        let address: EmailAddress = "good@example.com".parse().unwrap();
        assert_eq!(address.local(), "good");
        assert_eq!(address.domain(), "example.com");
        assert_eq!(address.to_string(), "good@example.com");
    }

    #[test]
    fn malformed_input_is_reported() {
        let err = EmailAddress::parse("bad-syntax").unwrap_err();
        assert_eq!(
            err,
            SyntaxError::Malformed {
                input: "bad-syntax".to_string()
            }
        );
    }
}
