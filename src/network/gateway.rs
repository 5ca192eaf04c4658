//! Gateway - WebSocket listener that accepts incoming connections.
//!
//! The Gateway binds the socket and spawns a Connection task for each
//! client that completes the WebSocket handshake.

use crate::config::ListenConfig;
use crate::network::Connection;
use crate::router::Router;
use crate::state::SessionRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// The Gateway accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Arc<[String]>,
    send_queue: usize,
    router: Arc<Router>,
    registry: Arc<SessionRegistry>,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(
        config: &ListenConfig,
        router: Arc<Router>,
        registry: Arc<SessionRegistry>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");

        Ok(Self {
            listener,
            allow_origins: config.allow_origins.clone().into(),
            send_queue: config.send_queue,
            router,
            registry,
        })
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Failed to accept WebSocket connection");
                    continue;
                }
            };

            let allowed = Arc::clone(&self.allow_origins);
            let router = Arc::clone(&self.router);
            let registry = Arc::clone(&self.registry);
            let send_queue = self.send_queue;

            tokio::spawn(async move {
                let origin_check = |req: &Request, response: Response| {
                    check_origin(&allowed, req, addr).map(|()| response)
                };

                match accept_hdr_async(stream, origin_check).await {
                    Ok(ws_stream) => {
                        let conn = Uuid::new_v4();
                        let connection =
                            Connection::new(conn, addr, ws_stream, send_queue, router, registry);
                        connection.run().await;
                    }
                    Err(e) => {
                        warn!(%addr, error = %e, "WebSocket handshake failed");
                    }
                }
            });
        }
    }
}

/// Origin validation for the handshake. An empty allow-list accepts any origin.
fn check_origin(allowed: &[String], req: &Request, addr: SocketAddr) -> Result<(), ErrorResponse> {
    if allowed.is_empty() {
        return Ok(());
    }

    let origin = req
        .headers()
        .get("Origin")
        .and_then(|o| o.to_str().ok());
    if let Some(origin) = origin
        && allowed.iter().any(|a| a == origin || a == "*")
    {
        return Ok(());
    }

    warn!(%addr, origin = origin.unwrap_or("-"), "WebSocket origin rejected");
    let mut rejection = ErrorResponse::new(Some("Origin not allowed".to_string()));
    *rejection.status_mut() = StatusCode::FORBIDDEN;
    Err(rejection)
}
