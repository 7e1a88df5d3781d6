//! `spacedock-auth`: bearer credential resolution and ownership policy.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authenticate;
pub mod claims;
pub mod principal;

pub use authenticate::{AuthError, Authenticator, Hs256JwtAuthenticator};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use principal::Principal;
