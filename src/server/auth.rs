//! Bearer token verification
//!
//! Tokens are HS256 JWTs carrying a `token_type` claim that tells service
//! tokens apart from client (end-user) tokens. A token that fails
//! verification is ignored: the request still runs, just without claims, and
//! resolvers decide whether that is acceptable.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who a token was issued to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// A token issued to an end user
    #[default]
    Client,
    /// A token issued to another service
    Service,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id or service name
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub token_type: TokenType,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
}

/// Verifies HS256 access tokens against a shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.trim().as_bytes()),
            validation,
        }
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

/// Verified identities attached to one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub service: Option<Claims>,
    pub user: Option<Claims>,
}

impl Identity {
    /// Decode the bearer token in `headers`, if any, into an identity.
    pub fn from_headers(headers: &HeaderMap, verifier: Option<&TokenVerifier>) -> Self {
        let (Some(token), Some(verifier)) = (extract_token(headers), verifier) else {
            return Self::default();
        };

        match verifier.verify(&token) {
            Ok(claims) => {
                tracing::debug!(sub = %claims.sub, token_type = ?claims.token_type, "Token verified");
                match claims.token_type {
                    TokenType::Service => Self {
                        service: Some(claims),
                        user: None,
                    },
                    TokenType::Client => Self {
                        service: None,
                        user: Some(claims),
                    },
                }
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    token_prefix = %&token[..token.len().min(12)],
                    "Token verification failed"
                );
                Self::default()
            }
        }
    }
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
