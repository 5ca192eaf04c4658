//! End-to-end tests: accounts over HTTP, mutations and fan-out over WebSocket.

mod common;

use common::TestServer;
use serde_json::json;

/// The id of the newest link in a `receive-links` payload.
fn newest_link_id(snapshot: &serde_json::Value) -> i64 {
    snapshot["linkGroups"][0]["links"][0]["id"]
        .as_i64()
        .expect("snapshot has a link")
}

#[tokio::test]
async fn add_link_fans_out_to_every_session_of_the_account() {
    let server = TestServer::spawn().await.expect("server");
    let alice = server.login("alice").await.expect("alice");
    let bob = server.login("bob").await.expect("bob");

    let mut tab_a = server.connect(&alice).await.unwrap();
    let mut tab_b = server.connect(&alice).await.unwrap();
    let mut other = server.connect(&bob).await.unwrap();
    for client in [&mut tab_a, &mut tab_b, &mut other] {
        let snapshot = client.get_links().await.unwrap();
        assert_eq!(snapshot["linkCount"], 0);
    }

    tab_a
        .send_frame(json!({
            "authToken": alice,
            "method": "add-link",
            "payload": {"title": "x", "link": "http://a"},
            "requestId": "r1",
        }))
        .await
        .unwrap();

    let expected = json!({"event": "link-added", "payload": {"requestId": "r1"}});
    assert_eq!(tab_a.recv().await.unwrap(), expected);
    assert_eq!(tab_b.recv().await.unwrap(), expected);
    other.expect_silence().await.unwrap();

    let snapshot = tab_b.get_links().await.unwrap();
    assert_eq!(snapshot["linkCount"], 1);
    assert_eq!(snapshot["linkGroups"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["linkGroups"][0]["links"][0]["url"], "http://a");
}

#[tokio::test]
async fn deleting_twice_is_reported_once_as_deleted() {
    let server = TestServer::spawn().await.expect("server");
    let alice = server.login("alice").await.expect("alice");
    let mut tab_a = server.connect(&alice).await.unwrap();
    let mut tab_b = server.connect(&alice).await.unwrap();
    tab_b.get_links().await.unwrap();

    tab_a
        .send("add-link", json!({"title": "x", "link": "http://a"}))
        .await
        .unwrap();
    tab_a.recv_event("link-added").await.unwrap();
    tab_b.recv_event("link-added").await.unwrap();
    let link_id = newest_link_id(&tab_a.get_links().await.unwrap());

    tab_a.send("delete-link", json!(link_id)).await.unwrap();
    tab_a.send("delete-link", json!(link_id)).await.unwrap();

    let first = tab_a.recv().await.unwrap();
    let second = tab_a.recv().await.unwrap();
    let mut names = vec![first["event"].clone(), second["event"].clone()];
    names.sort_by_key(|n| n.to_string());
    assert_eq!(names, vec![json!("link-already-deleted"), json!("link-deleted")]);

    assert_eq!(
        tab_b.recv().await.unwrap(),
        json!({"event": "link-deleted", "payload": link_id})
    );
    tab_b.expect_silence().await.unwrap();

    let snapshot = tab_a.get_links().await.unwrap();
    assert_eq!(snapshot["linkCount"], 0);
    assert_eq!(snapshot["linkGroups"], json!([]));
}

#[tokio::test]
async fn invalid_token_asks_for_a_valid_one() {
    let server = TestServer::spawn().await.expect("server");
    let mut client = server.connect("not-a-token").await.unwrap();

    client
        .send("delete-link", json!(3))
        .await
        .unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        json!({
            "event": "need-valid-token",
            "payload": {"method": "delete-link", "payload": 3}
        })
    );

    client.send_frame(json!({})).await.unwrap();
    assert_eq!(
        client.recv().await.unwrap(),
        json!({"event": "need-valid-token"})
    );

    client.send_frame(json!("not an object")).await.unwrap();
    client.expect_silence().await.unwrap();
}

#[tokio::test]
async fn foreign_ids_leave_the_owner_untouched() {
    let server = TestServer::spawn().await.expect("server");
    let alice = server.login("alice").await.expect("alice");
    let bob = server.login("bob").await.expect("bob");
    let mut alice_ws = server.connect(&alice).await.unwrap();
    let mut bob_ws = server.connect(&bob).await.unwrap();
    bob_ws.get_links().await.unwrap();

    alice_ws
        .send("add-link", json!({"title": "x", "link": "http://a"}))
        .await
        .unwrap();
    alice_ws.recv_event("link-added").await.unwrap();
    let snapshot = alice_ws.get_links().await.unwrap();
    let link_id = newest_link_id(&snapshot);
    let group_id = snapshot["linkGroups"][0]["linkGroup"]["id"].as_i64().unwrap();

    bob_ws.send("delete-link", json!(link_id)).await.unwrap();
    assert_eq!(
        bob_ws.recv().await.unwrap(),
        json!({"event": "link-already-deleted", "payload": link_id})
    );
    bob_ws
        .send(
            "rename-link-group",
            json!({"linkGroupId": group_id, "linkGroupName": "stolen"}),
        )
        .await
        .unwrap();
    bob_ws.expect_silence().await.unwrap();
    alice_ws.expect_silence().await.unwrap();

    let snapshot = alice_ws.get_links().await.unwrap();
    assert_eq!(snapshot["linkCount"], 1);
    assert_eq!(snapshot["linkGroups"][0]["linkGroup"]["title"], json!(null));
}

#[tokio::test]
async fn api_key_ingestion_reaches_live_sessions() {
    let server = TestServer::spawn().await.expect("server");
    let alice = server.login("alice").await.expect("alice");
    let api_key = server.api_key(&alice).await.expect("api key");
    let mut tab = server.connect(&alice).await.unwrap();
    tab.get_links().await.unwrap();

    let bad_key = server
        .post_text(
            "/add-link",
            json!({"username": "alice", "apiKey": "nope", "title": "t", "link": "http://a"}),
        )
        .await
        .unwrap();
    assert_eq!(bad_key, "Invalid API Key or Username");

    let bad_link = server
        .post_text(
            "/add-link",
            json!({"username": "alice", "apiKey": api_key, "title": "t"}),
        )
        .await
        .unwrap();
    assert_eq!(bad_link, "Invalid link format");
    tab.expect_silence().await.unwrap();

    let ok = server
        .post_text(
            "/add-link",
            json!({"username": "alice", "apiKey": api_key, "title": "t", "link": "http://a"}),
        )
        .await
        .unwrap();
    assert_eq!(ok, "Success");
    assert_eq!(tab.recv().await.unwrap(), json!({"event": "link-added"}));

    let form = server
        .http()
        .post(server.http_url("/add-link"))
        .form(&[
            ("username", "alice"),
            ("apiKey", api_key.as_str()),
            ("title", "from a bookmarklet"),
            ("link", "http://b"),
        ])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(form, "Success");
    assert_eq!(tab.recv().await.unwrap(), json!({"event": "link-added"}));
}

#[tokio::test]
async fn account_routes_follow_the_json_contract() {
    let server = TestServer::spawn().await.expect("server");
    server.login("alice").await.expect("alice");

    let again = server
        .post_json("/register", json!({"username": "alice", "password": "pw"}))
        .await
        .unwrap();
    assert_eq!(
        again,
        json!({"success": false, "message": "Registration failed. User already exists."})
    );

    let missing = server
        .post_json("/authenticate", json!({"username": "alice"}))
        .await
        .unwrap();
    assert_eq!(missing["message"], "Authentication failed. No password provided.");

    let wrong = server
        .post_json("/authenticate", json!({"username": "alice", "password": "wrong"}))
        .await
        .unwrap();
    assert_eq!(wrong["success"], false);

    let unauthenticated: serde_json::Value = server
        .http()
        .get(server.http_url("/api-key/list"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        unauthenticated,
        json!({"success": false, "message": "Authentication failed"})
    );
}
