//! Broadcast notifier.
//!
//! Pushes an event to every live connection of an account. Delivery is
//! best-effort: a full or closed queue drops the event for that connection.
//! Closed connections are cleaned up by their own task, not here.

use super::registry::{Outbox, SessionRegistry};
use crate::db::UserId;
use crate::protocol::Event;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Fans events out through the session registry.
#[derive(Debug, Clone)]
pub struct Notifier {
    registry: Arc<SessionRegistry>,
}

impl Notifier {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Send `event` to every live connection of `identity`.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn notify(&self, identity: UserId, event: Event) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;
        self.registry.for_each_live(identity, |conn, outbox| {
            if let Err(err) = outbox.try_send(Arc::clone(&event)) {
                match err {
                    TrySendError::Full(_) => {
                        debug!(%conn, event = event.name(), "Send queue full, event dropped")
                    }
                    TrySendError::Closed(_) => {
                        debug!(%conn, event = event.name(), "Connection closing, event dropped")
                    }
                }
            } else {
                delivered += 1;
            }
        });
        delivered
    }
}

/// Send an event to a single connection, best-effort.
pub fn reply(outbox: &Outbox, event: Event) -> bool {
    match outbox.try_send(Arc::new(event)) {
        Ok(()) => true,
        Err(err) => {
            debug!(error = %err, "Reply dropped");
            false
        }
    }
}
