//! DNS MX resolution.
//!
//! [`MxResolver::resolve_mx`] never fails: a missing record, a non-existent
//! domain, a timeout or any other resolver error all degrade to an empty host
//! list. Only building the underlying resolver ([`build_resolver`]) can fail.

mod error;
mod resolver;
mod types;

pub use error::{LookupFailure, MxError};
pub use resolver::{MxLookup, MxResolver, build_resolver};
pub use types::MxHost;
