//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, DatabaseConfig)
//! - [`listen`]: Network listener configuration (ListenConfig, HttpConfig)
//! - [`auth`]: Token signing and group policy configuration (AuthConfig, GroupsConfig)
//! - [`validation`]: Startup checks

mod auth;
mod defaults;
mod listen;
mod types;
pub mod validation;

pub use listen::ListenConfig;
pub use types::Config;
