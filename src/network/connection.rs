//! Connection - Handles an individual WebSocket client.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//!    ┌───────────────────────────────────────────────┐
//!    │             Connection Task                   │
//!    │                                               │
//!    │  ws stream ──▶ tokio::select! ◀── outbox rx   │
//!    │                  │        │                   │
//!    │                  ▼        ▼                   │
//!    │              [Router]   ws sink               │
//!    └───────────────────────────────────────────────┘
//! ```
//!
//! Text frames go to the router, events queued on the outbox are written
//! back. Whatever ends the loop, the connection is unregistered on the way out.

use crate::router::{Context, Router};
use crate::state::{ConnectionId, SessionRegistry};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

/// A client connection handler.
pub struct Connection {
    conn: ConnectionId,
    addr: SocketAddr,
    stream: WebSocketStream<TcpStream>,
    send_queue: usize,
    router: Arc<Router>,
    registry: Arc<SessionRegistry>,
}

impl Connection {
    pub fn new(
        conn: ConnectionId,
        addr: SocketAddr,
        stream: WebSocketStream<TcpStream>,
        send_queue: usize,
        router: Arc<Router>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            conn,
            addr,
            stream,
            send_queue,
            router,
            registry,
        }
    }

    /// Run the connection until the peer goes away.
    #[instrument(skip(self), fields(conn = %self.conn, addr = %self.addr), name = "connection")]
    pub async fn run(self) {
        info!("Client connected");

        let (mut sink, mut inbound) = self.stream.split();
        let (outbox, mut events) = mpsc::channel(self.send_queue);
        let ctx = Context {
            conn: self.conn,
            outbox,
        };

        loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.router.dispatch(&ctx, &text);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Peer closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                },

                Some(event) = events.recv() => {
                    let json = match event.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(event = event.name(), error = %e, "Failed to encode event");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(json)).await {
                        warn!(error = %e, "Write error");
                        break;
                    }
                }
            }
        }

        let memberships = self.registry.unregister(self.conn);
        info!(memberships, "Client disconnected");
    }
}
