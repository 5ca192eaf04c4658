//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_server_name() -> String {
    "linkstash".to_string()
}

pub fn default_database_path() -> String {
    "linkstash.db".to_string()
}

// =============================================================================
// Listener Defaults
// =============================================================================

/// Outbound events buffered per connection before sends start dropping.
pub fn default_send_queue() -> usize {
    64
}

// =============================================================================
// Auth Defaults
// =============================================================================

/// Tokens live for one day.
pub fn default_token_ttl_secs() -> u64 {
    86_400
}

// =============================================================================
// Group Policy Defaults
// =============================================================================

pub fn default_reuse_window_days() -> u32 {
    3
}
