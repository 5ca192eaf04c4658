//! API key generation for the key-authenticated ingestion endpoint.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated keys.
pub const API_KEY_LEN: usize = 36;

/// Generate a random alphanumeric API key.
pub fn generate() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LEN)
        .map(char::from)
        .collect()
}
