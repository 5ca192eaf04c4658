//! Test WebSocket client.
//!
//! Sends protocol frames and asserts on the events the server pushes back.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// A test protocol client.
pub struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    token: String,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(url: &str, token: &str) -> anyhow::Result<Self> {
        let (ws, _response) = connect_async(url).await?;
        Ok(Self {
            ws,
            token: token.to_string(),
        })
    }

    /// Send a raw JSON frame.
    pub async fn send_frame(&mut self, frame: Value) -> anyhow::Result<()> {
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Send an authenticated request.
    pub async fn send(&mut self, method: &str, payload: Value) -> anyhow::Result<()> {
        let frame = json!({"authToken": self.token, "method": method, "payload": payload});
        self.send_frame(frame).await
    }

    /// Send `get-links` and return the `receive-links` payload.
    ///
    /// Also registers the connection for broadcasts.
    pub async fn get_links(&mut self) -> anyhow::Result<Value> {
        let frame = json!({"authToken": self.token, "method": "get-links"});
        self.send_frame(frame).await?;
        let event = self.recv_event("receive-links").await?;
        Ok(event["payload"].clone())
    }

    /// Receive a single event.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive an event with a timeout. Non-text frames are skipped.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        loop {
            let frame = timeout(dur, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            if let Message::Text(text) = frame {
                return Ok(serde_json::from_str(&text)?);
            }
        }
    }

    /// Receive events until one named `name` arrives, and return it.
    pub async fn recv_event(&mut self, name: &str) -> anyhow::Result<Value> {
        loop {
            let event = self.recv().await?;
            if event["event"] == name {
                return Ok(event);
            }
        }
    }

    /// Assert nothing arrives for a short while.
    pub async fn expect_silence(&mut self) -> anyhow::Result<()> {
        match self.recv_timeout(Duration::from_millis(300)).await {
            Ok(event) => anyhow::bail!("unexpected event: {event}"),
            Err(_) => Ok(()),
        }
    }
}
