//! Portal token lifecycle: issuance, encoding, expiry, validation.
//!
//! The codec signs and verifies the token itself; the store half of the
//! contract (`store::TokenStore`) holds the single active token per
//! proposal; the validator combines codec, store, and clock; the issuer is
//! the internal write path that mints and persists new tokens.

pub mod codec;
pub mod issuer;
pub mod ttl;
pub mod validator;

#[cfg(test)]
mod proptests;

pub use codec::{CodecError, IssuedToken, PortalClaims, TokenCodec};
pub use issuer::{IssueError, IssuedPortal, PortalIssuer};
pub use ttl::TokenTtl;
pub use validator::{TokenValidator, ValidatedAccess, ValidationError};
