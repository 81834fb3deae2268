//! Caller identity for participant routes.
//!
//! The core only needs a stable participant id and optional display
//! attributes; [`IdentityVerifier`] is the seam, [`JwtVerifier`] the shipped
//! implementation validating HS256 bearer tokens.

use crate::server::config::JwtConfig;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use pichord::Claimant;
use serde::Deserialize;
use subtle::ConstantTimeEq;

/// A verified caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub participant_id: String,
    pub claimant: Claimant,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("authorization header is not a bearer token")]
    Malformed,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token has an empty subject")]
    EmptySubject,
}

pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, headers: &HeaderMap) -> Result<Identity, AuthError>;
}

/// Returns the token of an `Authorization: Bearer <token>` header. The
/// scheme name is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::Missing)?;
    let value = value.to_str().map_err(|_| AuthError::Malformed)?;
    let (scheme, token) = value.trim_start().split_once(' ').ok_or(AuthError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(AuthError::Malformed);
    }
    Some(token.trim())
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Malformed)
}

/// Compares a presented secret with the expected one in constant time with
/// respect to their contents. Only a length mismatch returns early.
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    handle: Option<String>,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        let mut required = vec!["exp"];
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match &config.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);
        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = bearer_token(headers)?;
        let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::EmptySubject);
        }
        Ok(Identity {
            participant_id: claims.sub,
            claimant: Claimant {
                display_name: claims.name.filter(|n| !n.trim().is_empty()),
                handle: claims.handle.filter(|h| !h.trim().is_empty()),
            },
        })
    }
}
