//! Bearer credential resolution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::principal::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed or badly signed token: {0}")]
    InvalidToken(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    /// The authority behind the credential could not be reached.
    #[error("authentication unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a bearer credential to the caller's `{account, privileged}`.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError>;
}

/// HS256-signed JWTs carrying [`JwtClaims`].
pub struct Hs256JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtAuthenticator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window lives in `issued_at`/`expires_at`, checked by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, AuthError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[async_trait]
impl Authenticator for Hs256JwtAuthenticator {
    async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthError> {
        let claims = self.decode(token, now)?;
        Ok(Principal {
            account: claims.sub,
            privileged: claims.privileged,
        })
    }
}
