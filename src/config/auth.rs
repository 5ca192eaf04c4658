//! Token signing and group policy configuration.

use serde::Deserialize;

use super::defaults::{default_reuse_window_days, default_token_ttl_secs};

/// Secret used by the sample config. Refused at startup unless explicitly allowed.
pub const PLACEHOLDER_SECRET: &str = "change-me-to-a-long-random-secret";

/// Bearer token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret shared by the issuer and the verifier.
    pub token_secret: String,
    /// Lifetime of issued tokens, in seconds.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    /// Whether the secret is the shipped placeholder.
    pub fn is_placeholder_secret(&self) -> bool {
        self.token_secret == PLACEHOLDER_SECRET
    }
}

/// Grouping policy for single-link additions.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupsConfig {
    /// A new link joins the newest group if that group is younger than this many days.
    #[serde(default = "default_reuse_window_days")]
    pub reuse_window_days: u32,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            reuse_window_days: default_reuse_window_days(),
        }
    }
}

impl GroupsConfig {
    /// The reuse window as a chrono duration.
    pub fn reuse_window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.reuse_window_days))
    }
}
