//! HS256 JSON Web Tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::account::Role;

/// `purpose` claim carried by password reset tokens.
pub const PASSWORD_RESET_PURPOSE: &str = "password-reset";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token could not be encoded")]
    Encoding,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnsupportedAlgorithm
            }
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    /// Fingerprint of the password hash a reset token was issued against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,
}

/// Signs and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issues a session token valid for `ttl`.
    pub fn issue_session(&self, sub: Uuid, role: Role, ttl: Duration) -> Result<String, TokenError> {
        self.sign(&build_claims(sub, role, ttl))
    }

    /// Issues a password reset token valid for one hour. It stops verifying
    /// against the account once the password hash changes.
    pub fn issue_password_reset(
        &self,
        sub: Uuid,
        role: Role,
        password_fingerprint: String,
    ) -> Result<String, TokenError> {
        let mut claims = build_claims(sub, role, Duration::hours(1));
        claims.purpose = Some(PASSWORD_RESET_PURPOSE.to_string());
        claims.pwd = Some(password_fingerprint);
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|_| TokenError::Encoding)
    }

    /// Verifies algorithm, signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}

fn build_claims(sub: Uuid, role: Role, ttl: Duration) -> Claims {
    let now = Utc::now();
    Claims {
        sub,
        role,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        purpose: None,
        pwd: None,
    }
}
