//! Credential discovery and session handling for Cyclocity bike-share sites.
//!
//! The operator's API has no published contract: the OAuth client
//! credentials and the endpoint descriptors are embedded in the web
//! front-end bundle. This crate recovers them by static text extraction,
//! negotiates a token pair and keeps it fresh.
//!
//! # Components
//!
//! - [`codec`]: decodes the compressed `exp` claim of an access token
//! - [`extract`]: pluggable extraction strategies over script text
//! - [`bundle`]: fetches the landing page and lists script fragments
//! - [`discovery`]: fragment search order and termination policy
//! - [`negotiator`]: token issuance and refresh exchanges
//! - [`session`]: token pair, expiry tracking and authorization header

pub mod bundle;
pub mod codec;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod negotiator;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use bundle::BundleLocator;
pub use codec::{DecodedToken, TokenCodec};
pub use discovery::{
    ClientConfig, ContractInfo, DiscoveredConfig, DiscoveryOptions, Extractors,
    StationsEndpointInfo, discover, discover_with, redact,
};
pub use error::{AuthError, Result};
pub use extract::{ExtractionOutcome, ExtractionStrategy, ObjectFields, RegexObjectStrategy};
pub use negotiator::{HttpNegotiator, TokenNegotiator, TokenPair};
pub use session::{AUTH_SCHEME, DEFAULT_REFRESH_WINDOW_MINS, RefreshPolicy, Session};
