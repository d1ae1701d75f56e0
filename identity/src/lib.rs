//! Identity canonicalization.
//!
//! Every login string the mechanism layer hands over (the authentication
//! identity and the requested authorization identity) passes through
//! [`Canonicalizer::canonicalize`] before any comparison, class lookup or
//! audit record uses it. Downstream code compares [`CanonicalIdentity`]
//! values only, never raw logins.

pub mod canon;
pub mod error;
pub mod types;
pub mod virtdomain;

pub use canon::Canonicalizer;
pub use error::{CanonError, Result};
pub use types::{CanonicalIdentity, ANONYMOUS_PRINCIPAL};
pub use virtdomain::{Cidr, DomainMapper, NoDomainMap, StaticDomainMap, TimeoutDomainMapper};
