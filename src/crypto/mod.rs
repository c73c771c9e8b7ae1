//! Cryptographic primitives for Portico
//!
//! Key derivation from the operator master secret lives here; token
//! signing itself is in `token::codec` on top of the derived key.

pub mod keyring;

pub use keyring::{KeyringError, PortalKeyring};
