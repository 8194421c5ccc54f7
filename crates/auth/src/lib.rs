//! Bearer-token identity for endpoints, per §4.2.
//!
//! Verification is pure and synchronous; the HTTP surface wraps this in
//! its authentication middleware to resolve a token into an identity
//! before dispatch.

pub mod claims;
pub mod error;
pub mod identity;
pub mod issuer;

pub use claims::Claims;
pub use error::{AuthError, AuthResult};
pub use identity::Identity;
pub use issuer::{TokenIssuer, DEFAULT_TOKEN_TTL_SECONDS};
