//! Shared live-session state.
//!
//! - [`registry`]: which connections currently represent which account
//! - [`notifier`]: best-effort fan-out of events to those connections

pub mod notifier;
pub mod registry;

pub use notifier::Notifier;
pub use registry::{ConnectionId, Outbox, SessionRegistry};
