#![forbid(unsafe_code)]
//! mailprobe_lib : vérification de délivrabilité d'adresses e-mail (syntaxe, MX, sonde SMTP sans envoi)

pub mod mx;
pub mod smtp_verify;
pub mod validator;
pub mod verifier;

pub use mx::{LookupFailure, MxError, MxHost, MxLookup, MxResolver, build_resolver};
pub use smtp_verify::{
    AttemptStage, HostProber, ProbeOptions, ProbeOutcome, ServerAttempt, SessionError, SmtpEvent,
    SmtpProber, SmtpReply,
};
pub use validator::{EmailAddress, SyntaxError, is_valid_syntax};
pub use verifier::{
    BatchItem, BatchOutcome, InvalidReason, Verdict, VerdictStatus, Verifier, VerifierConfig,
    VerifierError,
};
