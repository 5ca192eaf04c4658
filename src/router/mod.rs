//! Dispatch router.
//!
//! Turns one inbound text frame into at most one spawned handler task.
//! Parsing and authentication happen inline, in arrival order, on the
//! connection's own task; the handler then runs detached so a slow storage
//! call never stalls the connection's read loop.
//!
//! Arrival order therefore covers parsing, authentication and registration
//! only. Handlers for two frames from one connection run concurrently on the
//! multi-threaded runtime and may reach storage in either order, so replies
//! and notifications for them can arrive swapped.
//!
//! Authentication is re-evaluated on every frame. A frame carrying a token
//! for a different account registers the connection under that account too.

use crate::db::UserId;
use crate::engine::{DeleteOutcome, EngineResult, MutationEngine};
use crate::protocol::{Envelope, Event, Request, RetryRequest};
use crate::security::{AuthGate, Identity, Rejection};
use crate::state::notifier::reply;
use crate::state::{ConnectionId, Outbox, SessionRegistry};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Per-connection state the router needs.
#[derive(Debug, Clone)]
pub struct Context {
    pub conn: ConnectionId,
    /// The connection's own outbound queue, for direct replies.
    pub outbox: Outbox,
}

/// Routes authenticated requests to the mutation engine.
#[derive(Debug)]
pub struct Router {
    gate: AuthGate,
    engine: MutationEngine,
    registry: Arc<SessionRegistry>,
}

impl Router {
    pub fn new(gate: AuthGate, engine: MutationEngine, registry: Arc<SessionRegistry>) -> Self {
        Self {
            gate,
            engine,
            registry,
        }
    }

    /// Handle one inbound text frame.
    ///
    /// Returns the spawned handler task, if the frame got that far.
    pub fn dispatch(self: &Arc<Self>, ctx: &Context, text: &str) -> Option<JoinHandle<()>> {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(conn = %ctx.conn, error = %e, "Dropping malformed message");
                return None;
            }
        };

        // A non-string method is treated as no method at all.
        let method = envelope.method_name().map(String::from);
        let identity = self.authenticate(envelope.auth_token.as_ref());
        let Envelope {
            payload,
            request_id,
            ..
        } = envelope;

        let identity = match identity {
            Ok(identity) => identity,
            Err(rejection) => {
                debug!(conn = %ctx.conn, ?rejection, "Asking for a valid token");
                let retry = method.map(|method| RetryRequest { method, payload });
                reply(&ctx.outbox, Event::NeedValidToken(retry));
                return None;
            }
        };

        if self.registry.register(identity.id, ctx.conn, &ctx.outbox) {
            info!(conn = %ctx.conn, user_id = identity.id, username = %identity.username, "Connection authenticated");
        }

        let Some(method) = method else {
            debug!(conn = %ctx.conn, "Message without method");
            return None;
        };

        let request = match Request::decode(&method, payload) {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(conn = %ctx.conn, %method, "Ignoring unknown method");
                return None;
            }
            Err(e) => {
                warn!(conn = %ctx.conn, %method, error = %e, "Dropping malformed payload");
                return None;
            }
        };

        let method = request.method();
        info!(conn = %ctx.conn, user_id = identity.id, method, "Routing request");

        let router = Arc::clone(self);
        let ctx = ctx.clone();
        let span = info_span!("request", conn = %ctx.conn, user_id = identity.id, method);
        Some(tokio::spawn(
            async move {
                if let Err(e) = router.handle(identity.id, &ctx, request, request_id).await {
                    if e.is_absence() {
                        info!(code = e.error_code(), error = %e, "Request had no effect");
                    } else {
                        error!(code = e.error_code(), error = %e, "Request failed");
                    }
                }
            }
            .instrument(span),
        ))
    }

    /// Authenticate the raw `authToken` value. Only a string can verify.
    fn authenticate(&self, token: Option<&Value>) -> Result<Identity, Rejection> {
        match token {
            None | Some(Value::Null) => self.gate.authenticate(None),
            Some(Value::String(token)) => self.gate.authenticate(Some(token)),
            Some(_) => Err(Rejection::Invalid),
        }
    }

    async fn handle(
        &self,
        owner: UserId,
        ctx: &Context,
        request: Request,
        request_id: Option<Value>,
    ) -> EngineResult<()> {
        let engine = &self.engine;
        match request {
            Request::GetLinks => {
                let snapshot = engine.snapshot(owner).await?;
                reply(&ctx.outbox, Event::ReceiveLinks(snapshot));
            }
            Request::AddLink(link) => {
                engine.add_link(owner, &link, request_id).await?;
            }
            Request::AddLinks(links) => {
                engine.add_links(owner, &links, request_id).await?;
            }
            Request::DeleteLink(link_id) => {
                if engine.delete_link(owner, link_id).await? == DeleteOutcome::AlreadyDeleted {
                    info!(link_id, "Link already deleted");
                    reply(&ctx.outbox, Event::LinkAlreadyDeleted(link_id));
                }
            }
            Request::ChangeLinkGroup(change) => engine.change_group(owner, change).await?,
            Request::RenameLinkGroup(rename) => engine.rename_group(owner, rename).await?,
            Request::CreateGroupWithLinks(create) => {
                engine.create_group_from_selection(owner, create).await?;
            }
            Request::MergeGroups(merge) => engine.merge_groups(owner, merge).await?,
            Request::MoveLinks(moved) => engine.move_matching_links(owner, moved).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewLink};
    use crate::security::{Identity, TokenSigner};
    use crate::state::Notifier;
    use chrono::Duration;
    use serde_json::json;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Harness {
        router: Arc<Router>,
        registry: Arc<SessionRegistry>,
        signer: TokenSigner,
    }

    impl Harness {
        async fn new() -> Self {
            let db = Database::new(":memory:").await.unwrap();
            let registry = Arc::new(SessionRegistry::new());
            let notifier = Notifier::new(Arc::clone(&registry));
            let engine = MutationEngine::new(db, notifier, Duration::days(3));
            let signer = TokenSigner::new("router-test-secret-0123", 3600);
            let router = Arc::new(Router::new(
                AuthGate::new(signer.clone()),
                engine,
                Arc::clone(&registry),
            ));
            Self {
                router,
                registry,
                signer,
            }
        }

        fn token(&self, id: UserId) -> String {
            self.signer
                .issue(&Identity {
                    id,
                    username: format!("user{id}"),
                })
                .unwrap()
        }

        fn connect(&self) -> (Context, mpsc::Receiver<Arc<Event>>) {
            let (outbox, rx) = mpsc::channel(32);
            (
                Context {
                    conn: Uuid::new_v4(),
                    outbox,
                },
                rx,
            )
        }

        async fn send(&self, ctx: &Context, frame: Value) {
            if let Some(task) = self.router.dispatch(ctx, &frame.to_string()) {
                task.await.unwrap();
            }
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<Event>>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    #[tokio::test]
    async fn malformed_json_is_dropped_silently() {
        let h = Harness::new().await;
        let (ctx, mut rx) = h.connect();

        assert!(h.router.dispatch(&ctx, "{not json").is_none());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(h.registry.identity_count(), 0);
    }

    #[tokio::test]
    async fn missing_token_echoes_request_for_retry() {
        let h = Harness::new().await;
        let (ctx, mut rx) = h.connect();

        h.send(&ctx, json!({"method": "delete-link", "payload": 4}))
            .await;
        h.send(&ctx, json!({"authToken": "garbage", "method": "get-links"}))
            .await;
        h.send(&ctx, json!({"authToken": "garbage"})).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                Event::NeedValidToken(Some(RetryRequest {
                    method: "delete-link".into(),
                    payload: Some(json!(4)),
                })),
                Event::NeedValidToken(Some(RetryRequest {
                    method: "get-links".into(),
                    payload: None,
                })),
                Event::NeedValidToken(None),
            ]
        );
        assert_eq!(h.registry.identity_count(), 0);
    }

    #[tokio::test]
    async fn non_string_token_is_an_invalid_token() {
        let h = Harness::new().await;
        let (ctx, mut rx) = h.connect();

        let numeric = r#"{"authToken":123,"method":"get-links"}"#;
        assert!(h.router.dispatch(&ctx, numeric).is_none());
        h.send(
            &ctx,
            json!({"authToken": {"x": 1}, "method": "delete-link", "payload": 4}),
        )
        .await;

        assert_eq!(
            drain(&mut rx),
            vec![
                Event::NeedValidToken(Some(RetryRequest {
                    method: "get-links".into(),
                    payload: None,
                })),
                Event::NeedValidToken(Some(RetryRequest {
                    method: "delete-link".into(),
                    payload: Some(json!(4)),
                })),
            ]
        );
        assert_eq!(h.registry.identity_count(), 0);
    }

    #[tokio::test]
    async fn non_string_method_counts_as_absent() {
        let h = Harness::new().await;
        let (ctx, mut rx) = h.connect();

        h.send(&ctx, json!({"authToken": "garbage", "method": 7}))
            .await;
        assert_eq!(drain(&mut rx), vec![Event::NeedValidToken(None)]);

        let task = h
            .router
            .dispatch(&ctx, &json!({"authToken": h.token(1), "method": 7}).to_string());
        assert!(task.is_none());
        assert!(h.registry.is_registered(1, ctx.conn));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn authenticated_message_registers_connection() {
        let h = Harness::new().await;
        let (ctx, _rx) = h.connect();

        h.send(&ctx, json!({"authToken": h.token(1), "method": "no-such-method"}))
            .await;

        assert!(h.registry.is_registered(1, ctx.conn));
    }

    #[tokio::test]
    async fn token_for_another_account_adds_membership() {
        let h = Harness::new().await;
        let (ctx, _rx) = h.connect();

        h.send(&ctx, json!({"authToken": h.token(1)})).await;
        h.send(&ctx, json!({"authToken": h.token(2)})).await;

        assert!(h.registry.is_registered(1, ctx.conn));
        assert!(h.registry.is_registered(2, ctx.conn));
    }

    #[tokio::test]
    async fn add_link_fans_out_and_get_links_replies_to_sender_only() {
        let h = Harness::new().await;
        let (tab_a, mut rx_a) = h.connect();
        let (tab_b, mut rx_b) = h.connect();
        let (stranger, mut rx_s) = h.connect();
        h.send(&tab_b, json!({"authToken": h.token(1)})).await;
        h.send(&stranger, json!({"authToken": h.token(2)})).await;

        h.send(
            &tab_a,
            json!({
                "authToken": h.token(1),
                "method": "add-link",
                "payload": {"title": "x", "link": "http://a"},
                "requestId": 11,
            }),
        )
        .await;

        let added = Event::LinkAdded {
            request_id: Some(json!(11)),
        };
        assert_eq!(drain(&mut rx_a), vec![added.clone()]);
        assert_eq!(drain(&mut rx_b), vec![added]);
        assert!(drain(&mut rx_s).is_empty());

        h.send(&tab_a, json!({"authToken": h.token(1), "method": "get-links"}))
            .await;
        let events = drain(&mut rx_a);
        assert!(drain(&mut rx_b).is_empty());
        let [Event::ReceiveLinks(snapshot)] = events.as_slice() else {
            panic!("expected a single snapshot, got {events:?}");
        };
        assert_eq!(snapshot.link_count, 1);
        assert_eq!(snapshot.link_groups[0].links[0].url, "http://a");
    }

    #[tokio::test]
    async fn second_delete_is_reported_to_requester_only() {
        let h = Harness::new().await;
        let (tab_a, mut rx_a) = h.connect();
        let (tab_b, mut rx_b) = h.connect();
        h.send(&tab_b, json!({"authToken": h.token(1)})).await;

        let link = h
            .router
            .engine
            .add_link(
                1,
                &NewLink {
                    title: "x".into(),
                    link: "http://a".into(),
                },
                None,
            )
            .await
            .unwrap();
        drain(&mut rx_b);

        let delete = json!({"authToken": h.token(1), "method": "delete-link", "payload": link.id});
        h.send(&tab_a, delete.clone()).await;
        h.send(&tab_a, delete).await;

        assert_eq!(
            drain(&mut rx_a),
            vec![
                Event::LinkDeleted(link.id),
                Event::LinkAlreadyDeleted(link.id)
            ]
        );
        assert_eq!(drain(&mut rx_b), vec![Event::LinkDeleted(link.id)]);
    }

    #[tokio::test]
    async fn invalid_payload_is_dropped() {
        let h = Harness::new().await;
        let (ctx, mut rx) = h.connect();

        let task = h.router.dispatch(
            &ctx,
            &json!({"authToken": h.token(1), "method": "add-link", "payload": {"title": ""}})
                .to_string(),
        );

        assert!(task.is_none());
        assert!(drain(&mut rx).is_empty());
    }
}
