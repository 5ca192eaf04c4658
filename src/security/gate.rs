//! Authentication gate.
//!
//! Every inbound socket message and every authenticated HTTP request carries a
//! bearer token. The gate turns it into an [`Identity`] or a [`Rejection`].
//! All rejections look the same to the caller; only the log level differs.

use super::token::{Identity, TokenError, TokenSigner};
use tracing::{debug, error, info};

/// Why a credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No token supplied.
    Missing,
    /// Unparsable token or wrong signature. Same as no token.
    Invalid,
    /// Correctly signed but past its expiry. Normal; the client renews.
    Expired,
    /// Verification itself failed (bad key material, corrupt signed body).
    Fault,
}

/// Verifies bearer tokens against the shared secret.
#[derive(Debug, Clone)]
pub struct AuthGate {
    signer: TokenSigner,
}

impl AuthGate {
    pub fn new(signer: TokenSigner) -> Self {
        Self { signer }
    }

    /// The signer, for issuing tokens at login.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Verify a (possibly absent) token.
    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity, Rejection> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Err(Rejection::Missing);
        };

        match self.signer.verify(token) {
            Ok(identity) => Ok(identity),
            Err(TokenError::Malformed | TokenError::BadSignature) => {
                debug!("Rejected token with invalid signature");
                Err(Rejection::Invalid)
            }
            Err(TokenError::Expired(exp)) => {
                info!(expired_at = exp, "Token expired");
                Err(Rejection::Expired)
            }
            Err(e) => {
                error!(error = %e, "Token verification fault");
                Err(Rejection::Fault)
            }
        }
    }
}
