//! Test server management.
//!
//! Spawns and manages linkstashd instances for integration testing.

use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    ws_port: u16,
    http_port: u16,
    http: reqwest::Client,
    _data_dir: TempDir,
}

/// Ask the OS for a port nobody is listening on.
fn free_port() -> anyhow::Result<u16> {
    Ok(TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
}

impl TestServer {
    /// Spawn a new test server on fresh ports with a fresh database.
    pub async fn spawn() -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let ws_port = free_port()?;
        let http_port = free_port()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "linkstash.test"

[listen]
address = "127.0.0.1:{ws_port}"

[http]
address = "127.0.0.1:{http_port}"

[database]
path = "{}"

[auth]
token_secret = "integration-test-secret-0123456789"
"#,
            data_dir.path().join("test.db").display()
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_linkstashd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            ws_port,
            http_port,
            http: reqwest::Client::new(),
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until both listeners accept connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            let ws = tokio::net::TcpStream::connect(("127.0.0.1", self.ws_port)).await;
            let http = tokio::net::TcpStream::connect(("127.0.0.1", self.http_port)).await;
            if ws.is_ok() && http.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// WebSocket URL of the gateway.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/", self.ws_port)
    }

    /// Full URL of an HTTP API route.
    pub fn http_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.http_port)
    }

    /// POST a JSON body and return the parsed JSON reply.
    pub async fn post_json(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let reply = self
            .http
            .post(self.http_url(path))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        Ok(reply)
    }

    /// POST a JSON body and return the plain-text reply.
    pub async fn post_text(&self, path: &str, body: Value) -> anyhow::Result<String> {
        let reply = self
            .http
            .post(self.http_url(path))
            .json(&body)
            .send()
            .await?
            .text()
            .await?;
        Ok(reply)
    }

    /// Register an account and log in, returning a bearer token.
    pub async fn login(&self, username: &str) -> anyhow::Result<String> {
        let creds = json!({"username": username, "password": "correct horse battery"});

        let registered = self.post_json("/register", creds.clone()).await?;
        anyhow::ensure!(registered["success"] == true, "register failed: {registered}");

        let authenticated = self.post_json("/authenticate", creds).await?;
        authenticated["token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow::anyhow!("no token in {authenticated}"))
    }

    /// Generate an API key for the token's account and return it.
    pub async fn api_key(&self, token: &str) -> anyhow::Result<String> {
        let generated: Value = self
            .http
            .post(self.http_url("/api-key/generate"))
            .header("authToken", token)
            .send()
            .await?
            .json()
            .await?;
        anyhow::ensure!(generated["success"] == true, "generate failed: {generated}");

        let keys: Value = self
            .http
            .get(self.http_url("/api-key/list"))
            .header("authToken", token)
            .send()
            .await?
            .json()
            .await?;
        keys[0]["api_key"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow::anyhow!("no key in {keys}"))
    }

    /// Create a new WebSocket client authenticating with `token`.
    pub async fn connect(&self, token: &str) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.ws_url(), token).await
    }

    /// The shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
