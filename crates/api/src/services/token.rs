//! Signed access tokens (JWT, HS256).
//!
//! Tokens are `base64url(header).base64url(claims).base64url(signature)`
//! where the signature is HMAC-SHA256 over the first two segments. Only the
//! `HS256` algorithm is accepted; any other `alg` header is rejected before
//! the signature is checked.
//!
//! After the signature, the time claims are checked: `exp` must be in the
//! future, and neither `iat` nor an optional `nbf` may be later than now plus
//! [`CLOCK_LEEWAY_SECS`].

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use bookstore_core::{UserId, UserRole};

use crate::models::CurrentUser;

type HmacSha256 = Hmac<Sha256>;

/// Clock skew tolerated on `iat` and `nbf`.
pub const CLOCK_LEEWAY_SECS: i64 = 60;

/// Errors when verifying a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("signing key is unusable")]
    Key,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl Claims {
    /// The caller identity these claims describe.
    #[must_use]
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.sub,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Issues and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenKeys {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)
    }

    /// Issue a token for a user, valid from `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Key` if the secret cannot key the MAC.
    pub fn issue(&self, user: &CurrentUser, now: i64) -> Result<String, TokenError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now.saturating_add(ttl),
            nbf: None,
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".to_owned(),
            typ: "JWT".to_owned(),
        };

        let header = serde_json::to_vec(&header).map_err(|_| TokenError::Malformed)?;
        let claims = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token's signature and time claims at `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token was rejected.
    pub fn verify(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        // Constant-time comparison.
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_segment(claims_b64)?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        let latest_start = now.saturating_add(CLOCK_LEEWAY_SECS);
        if claims.iat > latest_start || claims.nbf.is_some_and(|nbf| nbf > latest_start) {
            return Err(TokenError::NotYetValid);
        }

        Ok(claims)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
