//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Shortest accepted token secret, in bytes.
const MIN_SECRET_LEN: usize = 16;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("auth.token_secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),
    #[error("auth.token_ttl_secs must be greater than zero")]
    ZeroTokenTtl,
    #[error("groups.reuse_window_days must be greater than zero")]
    ZeroReuseWindow,
    #[error("listen.send_queue must be greater than zero")]
    ZeroSendQueue,
    #[error("listen.address and http.address must differ: {0}")]
    ListenerClash(std::net::SocketAddr),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    let secret_len = config.auth.token_secret.len();
    if secret_len < MIN_SECRET_LEN {
        errors.push(ValidationError::SecretTooShort(secret_len));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::ZeroTokenTtl);
    }

    if config.groups.reuse_window_days == 0 {
        errors.push(ValidationError::ZeroReuseWindow);
    }

    if config.listen.send_queue == 0 {
        errors.push(ValidationError::ZeroSendQueue);
    }
    if let Some(ref http) = config.http
        && http.address == config.listen.address
    {
        errors.push(ValidationError::ListenerClash(http.address));
    }

    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(
                config.database.path.clone(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
