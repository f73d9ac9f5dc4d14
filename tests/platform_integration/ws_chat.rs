use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::timeout;

use super::support::{
    connect_ws, recv_close_code, recv_json, send_json, signup, spawn_server,
};

/// Joining the group happens on the server task after the upgrade completes;
/// give freshly connected clients a beat before broadcasting at them.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

async fn create_room(client: &reqwest::Client, server: &super::support::ServerHandle) -> String {
    let response = client
        .post(server.url("/chat/rooms/"))
        .json(&json!({ "name": "general" }))
        .send()
        .await
        .expect("room create should respond");
    assert_eq!(response.status().as_u16(), 201);
    let body = response.json::<Value>().await.expect("room body should parse");
    body["id"].as_str().expect("room id expected").to_owned()
}

#[tokio::test]
async fn chat_fan_out_stays_within_the_room() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let room_one = create_room(&client, &server).await;
    let room_two = create_room(&client, &server).await;

    let mut alice = connect_ws(&server.ws_url(&format!("/ws/chat/{room_one}/"))).await;
    let mut bob = connect_ws(&server.ws_url(&format!("/ws/chat/{room_one}/"))).await;
    let mut carol = connect_ws(&server.ws_url(&format!("/ws/chat/{room_two}/"))).await;
    settle().await;

    send_json(&mut alice, json!({ "text": "hi" })).await;

    let frame = recv_json(&mut bob).await;
    assert_eq!(frame["type"], "chat.message");
    assert_eq!(frame["message"]["text"], "hi");
    assert_eq!(frame["message"]["sender"], "anonymous");
    assert!(frame["message"]["created_at"].is_string());

    // The sender is a group member too: exactly one copy comes back.
    let echoed = recv_json(&mut alice).await;
    assert_eq!(echoed["message"]["text"], "hi");
    let extra = timeout(Duration::from_millis(300), recv_json(&mut alice)).await;
    assert!(extra.is_err(), "sender must not receive the frame twice");

    // A client in another room sees nothing.
    let cross = timeout(Duration::from_millis(300), recv_json(&mut carol)).await;
    assert!(cross.is_err(), "frames must not cross rooms");

    server.stop().await;
}

#[tokio::test]
async fn chat_messages_are_persisted_before_broadcast() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (principal_id, token) = signup(&client, &server, "ada").await;

    let room = create_room(&client, &server).await;
    let mut sender =
        connect_ws(&server.ws_url(&format!("/ws/chat/{room}/?token={token}"))).await;
    let mut listener = connect_ws(&server.ws_url(&format!("/ws/chat/{room}/"))).await;
    settle().await;

    send_json(&mut sender, json!({ "text": "release shipped" })).await;
    let frame = recv_json(&mut listener).await;
    assert_eq!(frame["message"]["sender"], "ada");

    let messages = client
        .get(server.url(&format!("/chat/rooms/{room}/messages/")))
        .send()
        .await
        .expect("messages should respond")
        .json::<Value>()
        .await
        .expect("messages body should parse");
    let messages = messages.as_array().expect("messages should be an array");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "release shipped");
    assert_eq!(messages[0]["sender_id"], principal_id.as_str());

    server.stop().await;
}

#[tokio::test]
async fn empty_and_missing_text_frames_are_dropped() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let room = create_room(&client, &server).await;

    let mut sender = connect_ws(&server.ws_url(&format!("/ws/chat/{room}/"))).await;
    let mut listener = connect_ws(&server.ws_url(&format!("/ws/chat/{room}/"))).await;
    settle().await;

    send_json(&mut sender, json!({})).await;
    send_json(&mut sender, json!({ "text": "" })).await;
    send_json(&mut sender, json!({ "text": "  " })).await;
    send_json(&mut sender, json!({ "text": "real" })).await;

    let frame = recv_json(&mut listener).await;
    assert_eq!(frame["message"]["text"], "real");

    let messages = client
        .get(server.url(&format!("/chat/rooms/{room}/messages/")))
        .send()
        .await
        .expect("messages should respond")
        .json::<Value>()
        .await
        .expect("messages body should parse");
    assert_eq!(messages.as_array().expect("array expected").len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn unknown_room_closes_with_policy_code() {
    let server = spawn_server().await;

    let mut ws = connect_ws(&server.ws_url("/ws/chat/room-missing/")).await;
    let code = recv_close_code(&mut ws).await;
    assert_eq!(code, Some(1011));

    server.stop().await;
}

#[tokio::test]
async fn doc_updates_broadcast_without_persistence() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "grace").await;

    let mut editor =
        connect_ws(&server.ws_url(&format!("/ws/docs/doc-7/?token={token}"))).await;
    let mut viewer = connect_ws(&server.ws_url("/ws/docs/doc-7/")).await;
    let mut elsewhere = connect_ws(&server.ws_url("/ws/docs/doc-8/")).await;
    settle().await;

    send_json(
        &mut editor,
        json!({ "content": { "ops": [{ "insert": "hello" }] } }),
    )
    .await;

    let frame = recv_json(&mut viewer).await;
    assert_eq!(frame["type"], "doc.update");
    assert_eq!(frame["sender"], "grace");
    assert_eq!(frame["content"]["ops"][0]["insert"], "hello");

    let cross = timeout(Duration::from_millis(300), recv_json(&mut elsewhere)).await;
    assert!(cross.is_err(), "doc frames must not cross rooms");

    server.stop().await;
}

#[tokio::test]
async fn room_deletion_cascades_to_messages() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let room = create_room(&client, &server).await;

    let mut sender = connect_ws(&server.ws_url(&format!("/ws/chat/{room}/"))).await;
    settle().await;
    send_json(&mut sender, json!({ "text": "ephemeral" })).await;
    let _ = recv_json(&mut sender).await;

    let deleted = client
        .delete(server.url(&format!("/chat/rooms/{room}/")))
        .send()
        .await
        .expect("delete should respond");
    assert_eq!(deleted.status().as_u16(), 204);

    let messages = client
        .get(server.url(&format!("/chat/rooms/{room}/messages/")))
        .send()
        .await
        .expect("messages should respond");
    assert_eq!(messages.status().as_u16(), 404);

    server.stop().await;
}
