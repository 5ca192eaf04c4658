//! Security module: credentials and the authentication gate.
//!
//! - [`token`]: HMAC-SHA256 signed bearer tokens with expiry
//! - [`gate`]: token → identity resolution with per-cause logging
//! - [`password`]: Argon2 password hashing
//! - [`api_key`]: random keys for the ingestion endpoint

pub mod api_key;
pub mod gate;
pub mod password;
pub mod token;

pub use gate::{AuthGate, Rejection};
pub use token::{Identity, TokenSigner};
