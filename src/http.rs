//! HTTP API server.
//!
//! Runs on a separate tokio task next to the WebSocket gateway and serves:
//! - `POST /register`, `POST /authenticate`: accounts and token issuance
//! - `/api-key/*`: API key management, behind the `authToken` header
//! - `POST /add-link`: key-authenticated ingestion into the mutation engine
//!
//! Replies keep the `{success, message}` JSON shape (plain text for the
//! ingestion and key deletion routes) that existing clients expect.
//! `/add-link` takes its body as JSON or as an urlencoded form, so
//! bookmarklets can post to it directly.

use crate::db::{DbError, NewLink};
use crate::engine::MutationEngine;
use crate::security::{AuthGate, Identity};
use axum::extract::{Form, FromRequest, Path, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router, async_trait};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Header carrying the bearer token on authenticated routes.
pub const AUTH_HEADER: &str = "authtoken";

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    gate: AuthGate,
    engine: MutationEngine,
}

impl ApiState {
    pub fn new(gate: AuthGate, engine: MutationEngine) -> Self {
        Self { gate, engine }
    }
}

/// JSON reply used by the account and key routes.
#[derive(Debug, Serialize)]
struct Reply {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

impl Reply {
    fn ok(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message),
            token: None,
        })
    }

    fn failed(message: &'static str) -> Json<Self> {
        Json(Self {
            success: false,
            message: Some(message),
            token: None,
        })
    }

    fn token(token: String) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            token: Some(token),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl Credentials {
    /// The first thing missing from the request, as a client-facing message.
    fn missing(&self) -> Option<&'static str> {
        match (self.username.is_empty(), self.password.is_empty()) {
            (true, true) => Some("Authentication failed. No username & password provided."),
            (true, false) => Some("Authentication failed. No username provided."),
            (false, true) => Some("Authentication failed. No password provided."),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
}

/// Ingestion body, decoded from JSON or from an urlencoded form by content type.
#[derive(Debug)]
struct IngestBody(IngestRequest);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for IngestBody {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(body) = Form::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(body))
        } else {
            let Json(body) = Json::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(body))
        }
    }
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    let api_keys = Router::new()
        .route("/generate", post(generate_api_key))
        .route("/list", get(list_api_keys))
        .route("/delete/:id", delete(delete_api_key))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/register", post(register))
        .route("/authenticate", post(authenticate))
        .route("/add-link", post(add_link))
        .nest("/api-key", api_keys)
        .with_state(state)
}

/// Serve the API on an already bound listener until the process exits.
pub async fn run_http_server(listener: TcpListener, state: ApiState) {
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "HTTP API listening"),
        Err(e) => warn!(error = %e, "HTTP API listening on unknown address"),
    }

    if let Err(e) = axum::serve(listener, router(state)).await {
        error!(error = %e, "HTTP server error");
    }
}

/// Resolve the `authToken` header and attach the identity to the request.
async fn require_token(State(state): State<ApiState>, mut req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.gate.authenticate(token) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(_) => Reply::failed("Authentication failed").into_response(),
    }
}

async fn register(State(state): State<ApiState>, Json(creds): Json<Credentials>) -> Response {
    if let Some(message) = creds.missing() {
        return Reply::failed(message).into_response();
    }

    let accounts = state.engine.database().accounts();
    match accounts.register(&creds.username, &creds.password).await {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "Account registered");
            Reply::ok("Registration complete.").into_response()
        }
        Err(DbError::UserExists(_)) => {
            Reply::failed("Registration failed. User already exists.").into_response()
        }
        Err(e) => {
            error!(error = %e, "Registration failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Reply::failed("Registration failed."),
            )
                .into_response()
        }
    }
}

async fn authenticate(State(state): State<ApiState>, Json(creds): Json<Credentials>) -> Response {
    if let Some(message) = creds.missing() {
        return Reply::failed(message).into_response();
    }

    let accounts = state.engine.database().accounts();
    let user = match accounts.verify_login(&creds.username, &creds.password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(username = %creds.username, "Login refused");
            return Reply::failed("Authentication failed. Invalid username or password.")
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Login lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Reply::failed("Authentication failed."),
            )
                .into_response();
        }
    };

    let identity = Identity {
        id: user.id,
        username: user.username,
    };
    match state.gate.signer().issue(&identity) {
        Ok(token) => Reply::token(token).into_response(),
        Err(e) => {
            error!(error = %e, "Token issuance failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Reply::failed("Authentication failed."),
            )
                .into_response()
        }
    }
}

async fn generate_api_key(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Json<Reply> {
    match state.engine.database().accounts().create_api_key(identity.id).await {
        Ok(key) => {
            info!(user_id = identity.id, key_id = key.id, "API key generated");
            Reply::ok("API Key Generated")
        }
        Err(e) => {
            error!(user_id = identity.id, error = %e, "API key generation failed");
            Reply::failed("API Key Could Not Be Generated")
        }
    }
}

async fn list_api_keys(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match state.engine.database().accounts().list_api_keys(identity.id).await {
        Ok(keys) => Json(keys).into_response(),
        Err(e) => {
            error!(user_id = identity.id, error = %e, "API key listing failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn delete_api_key(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> &'static str {
    match state
        .engine
        .database()
        .accounts()
        .delete_api_key(identity.id, id)
        .await
    {
        Ok(_) => "Success",
        Err(e) => {
            error!(user_id = identity.id, key_id = id, error = %e, "API key deletion failed");
            "Error"
        }
    }
}

async fn add_link(State(state): State<ApiState>, IngestBody(body): IngestBody) -> Response {
    if body.username.is_empty() || body.api_key.is_empty() {
        return "Invalid API Key or Username".into_response();
    }

    let accounts = state.engine.database().accounts();
    let owner = match accounts.api_key_owner(&body.username, &body.api_key).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return "Invalid API Key or Username".into_response(),
        Err(e) => {
            error!(error = %e, "API key lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response();
        }
    };

    let link = NewLink {
        title: body.title,
        link: body.link,
    };
    if !link.is_well_formed() {
        return "Invalid link format".into_response();
    }

    match state.engine.add_link(owner, &link, None).await {
        Ok(link) => {
            info!(user_id = owner, link_id = link.id, "Link ingested");
            "Success".into_response()
        }
        Err(e) => {
            error!(user_id = owner, code = e.error_code(), error = %e, "Ingestion failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
        }
    }
}
