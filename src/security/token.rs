//! Signed bearer tokens.
//!
//! Compact HS256 tokens in the familiar three-part layout:
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(HMAC-SHA256(secret, header "." claims))
//! ```
//!
//! Claims carry the account id, the username, and issue/expiry times in
//! seconds since the epoch.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::db::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Only header this issuer emits or accepts.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// The authenticated user context derived from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
}

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    id: UserId,
    username: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Token verification and issuance failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token expired at {0}")]
    Expired(i64),
    #[error("signing key rejected: {0}")]
    InvalidKey(String),
    #[error("claims could not be encoded or decoded: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for `identity`, valid from now for the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_at(identity, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if it had been issued at `issued_at`.
    pub fn issue_at(&self, identity: &Identity, issued_at: i64) -> Result<String, TokenError> {
        let claims = Claims {
            id: identity.id,
            username: identity.username.clone(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };

        let header = URL_SAFE_NO_PAD.encode(HEADER);
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{body}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes())?);

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify signature and expiry, returning the identity the token names.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify as of `now` (seconds since the epoch).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Identity, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(body), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| TokenError::Malformed)?;
        let parsed: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if parsed.alg != "HS256" {
            return Err(TokenError::Malformed);
        }

        let provided = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let signing_input_len = header.len() + 1 + body.len();
        let expected = self.sign(&token.as_bytes()[..signing_input_len])?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(TokenError::BadSignature);
        }

        // Past the signature check, a broken body is our own fault, not the caller's.
        let claims_bytes = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| TokenError::InvalidKey(format!("signed body not base64: {e}")))?;
        let claims: Claims = serde_json::from_slice(&claims_bytes)?;

        if claims.exp <= now {
            return Err(TokenError::Expired(claims.exp));
        }

        Ok(Identity {
            id: claims.id,
            username: claims.username,
        })
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
