//! Syntax check run before any network access.
//!
//! The rule is deliberately permissive: it catches gross malformation
//! (missing `@`, whitespace, no dot in the domain) and nothing more. Quoted
//! local parts, comments or address literals are not recognised.

mod types;

pub use types::{EmailAddress, SyntaxError};

use std::sync::LazyLock;

use regex::Regex;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static address pattern compiles")
});

/// Returns `true` when `address` looks like `local@domain.tld`.
///
/// Pure and deterministic; the input is not trimmed.
pub fn is_valid_syntax(address: &str) -> bool {
    ADDRESS_PATTERN.is_match(address)
}
