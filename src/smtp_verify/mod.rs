//! SMTP deliverability probing.
//!
//! [`SmtpProber`] runs the minimal handshake (greeting, `EHLO`/`HELO`,
//! `MAIL FROM`, `RCPT TO`, `QUIT`) against one host and classifies the
//! `RCPT TO` reply into a [`ProbeOutcome`]. Nothing is ever delivered.

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::SessionError;
pub use options::ProbeOptions;
pub use probe::{HostProber, SmtpProber};
pub use types::{AttemptStage, ProbeOutcome, ServerAttempt, SmtpEvent, SmtpReply};
