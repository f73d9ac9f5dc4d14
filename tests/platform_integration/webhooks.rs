use std::{
    collections::VecDeque,
    net::Ipv4Addr,
    sync::{Arc, Mutex},
};

use atrium_core::dispatch::sign_payload;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use super::support::{ServerHandle, signup, spawn_server, spawn_server_with};

#[derive(Debug, Clone)]
struct RecordedRequest {
    signature: Option<String>,
    content_type: Option<String>,
    body: String,
}

/// Throwaway local receiver: scripted status codes, captured requests.
#[derive(Debug, Default)]
struct Recorder {
    hits: Mutex<Vec<RecordedRequest>>,
    script: Mutex<VecDeque<u16>>,
}

impl Recorder {
    fn hit_count(&self) -> usize {
        self.hits.lock().expect("hits lock").len()
    }

    fn hits(&self) -> Vec<RecordedRequest> {
        self.hits.lock().expect("hits lock").clone()
    }
}

async fn hook_handler(
    State(recorder): State<Arc<Recorder>>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    recorder.hits.lock().expect("hits lock").push(RecordedRequest {
        signature: header("x-signature"),
        content_type: header("content-type"),
        body,
    });

    let status = recorder
        .script
        .lock()
        .expect("script lock")
        .pop_front()
        .unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

async fn spawn_receiver(script: &[u16]) -> (Arc<Recorder>, String) {
    let recorder = Arc::new(Recorder {
        hits: Mutex::new(Vec::new()),
        script: Mutex::new(script.iter().copied().collect()),
    });

    let app = Router::new()
        .route("/hook", post(hook_handler))
        .with_state(recorder.clone());
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("receiver should bind");
    let addr = listener.local_addr().expect("receiver addr");

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (recorder, format!("http://{addr}/hook"))
}

async fn create_subscription(
    client: &reqwest::Client,
    server: &ServerHandle,
    token: &str,
    url: &str,
    secret_ref: &str,
) -> String {
    let response = client
        .post(server.url("/webhooks/subscriptions/"))
        .bearer_auth(token)
        .json(&json!({
            "name": "ci-notify",
            "url": url,
            "secret_ref": secret_ref,
        }))
        .send()
        .await
        .expect("subscription create should respond");
    assert_eq!(response.status().as_u16(), 201);
    let body = response.json::<Value>().await.expect("subscription body should parse");
    body["id"].as_str().expect("subscription id expected").to_owned()
}

async fn trigger(
    client: &reqwest::Client,
    server: &ServerHandle,
    token: &str,
    payload: Value,
) -> Value {
    let response = client
        .post(server.url("/webhooks/events/trigger/"))
        .bearer_auth(token)
        .json(&json!({ "event_type": "deploy.finished", "payload": payload }))
        .send()
        .await
        .expect("trigger should respond");
    assert_eq!(response.status().as_u16(), 200);
    response.json::<Value>().await.expect("trigger body should parse")
}

#[tokio::test]
async fn non_https_subscriptions_are_skipped_without_io() {
    let server = spawn_server_with(|config| {
        config.webhook_require_https = true;
    })
    .await;
    let client = reqwest::Client::new();
    let (principal_id, token) = signup(&client, &server, "ops").await;

    let (recorder, receiver_url) = spawn_receiver(&[200]).await;

    // Creation refuses plain http, so plant the row directly.
    let subscription = atrium_core::domain::models::WebhookSubscription {
        id: "sub-insecure".to_owned(),
        owner_id: principal_id,
        name: "legacy".to_owned(),
        url: receiver_url,
        active: true,
        secret_ref: String::new(),
        created_at: Utc::now(),
    };
    server
        .state
        .store()
        .insert_webhook_subscription(&subscription)
        .await
        .expect("subscription should insert");

    let result = trigger(&client, &server, &token, json!({"run": 1})).await;
    let sent = result["sent"].as_array().expect("sent array expected");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["subscription_id"], "sub-insecure");
    assert_eq!(sent[0]["error"], "non-https url");
    assert!(sent[0].get("status_code").is_none());

    assert_eq!(recorder.hit_count(), 0, "no outbound request may be observable");

    let events = server
        .state
        .store()
        .list_webhook_events(Some("sub-insecure"), None)
        .await
        .expect("events should list");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_code, 0);
    assert_eq!(events[0].response_body, "skipped: non-https");

    server.stop().await;
}

#[tokio::test]
async fn retryable_statuses_are_retried_until_success() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let (recorder, receiver_url) = spawn_receiver(&[503, 503, 503, 200]).await;
    let subscription_id =
        create_subscription(&client, &server, &token, &receiver_url, "").await;

    let result = trigger(&client, &server, &token, json!({"run": 2})).await;
    let sent = result["sent"].as_array().expect("sent array expected");
    assert_eq!(sent[0]["status_code"], 200);

    assert_eq!(recorder.hit_count(), 4, "three retries after the first attempt");

    let events = server
        .state
        .store()
        .list_webhook_events(Some(&subscription_id), None)
        .await
        .expect("events should list");
    assert_eq!(events.len(), 1, "one audit record per delivery");
    assert_eq!(events[0].status_code, 200);

    server.stop().await;
}

#[tokio::test]
async fn exhausted_retries_record_the_terminal_status() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let (recorder, receiver_url) = spawn_receiver(&[503, 503, 503, 503, 503]).await;
    let subscription_id =
        create_subscription(&client, &server, &token, &receiver_url, "").await;

    let result = trigger(&client, &server, &token, json!({"run": 3})).await;
    assert_eq!(result["sent"][0]["status_code"], 503);
    assert_eq!(recorder.hit_count(), 4, "attempts are capped at four");

    let events = server
        .state
        .store()
        .list_webhook_events(Some(&subscription_id), None)
        .await
        .expect("events should list");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status_code, 503);

    server.stop().await;
}

#[tokio::test]
async fn payloads_are_signed_with_the_resolved_secret() {
    // SAFETY: test-local variable, set before the dispatcher reads it.
    unsafe { std::env::set_var("ATRIUM_HOOK_SECRET", "mysecret") };

    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let (recorder, receiver_url) = spawn_receiver(&[200]).await;
    create_subscription(&client, &server, &token, &receiver_url, "env:ATRIUM_HOOK_SECRET").await;

    trigger(&client, &server, &token, json!({"a": 1})).await;

    let hits = recorder.hits();
    assert_eq!(hits.len(), 1);
    let hit = &hits[0];

    assert_eq!(hit.content_type.as_deref(), Some("application/json"));
    assert_eq!(hit.body, r#"{"a":1}"#, "body is the compact payload encoding");
    assert_eq!(
        hit.signature.as_deref(),
        Some(sign_payload("mysecret", hit.body.as_bytes()).as_str()),
        "signature verifies against the received body"
    );
    assert_eq!(
        hit.signature.as_deref(),
        Some("1731f916fda95877b9a13a23fad534f9e6108a6051a8357360c38298832d3811")
    );

    server.stop().await;
}

#[tokio::test]
async fn one_failing_endpoint_does_not_affect_the_others() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    // Port 9 on localhost is not listening: every attempt is a transport error.
    create_subscription(&client, &server, &token, "http://127.0.0.1:9/hook", "").await;
    let (recorder, receiver_url) = spawn_receiver(&[200]).await;
    create_subscription(&client, &server, &token, &receiver_url, "").await;

    let result = trigger(&client, &server, &token, json!({"run": 4})).await;
    let sent = result["sent"].as_array().expect("sent array expected");
    assert_eq!(sent.len(), 2);

    let failed = &sent[0];
    assert!(failed.get("status_code").is_none());
    assert!(failed["error"].is_string());

    let delivered = &sent[1];
    assert_eq!(delivered["status_code"], 200);
    assert_eq!(recorder.hit_count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn subscription_creation_enforces_https_when_required() {
    let server = spawn_server_with(|config| {
        config.webhook_require_https = true;
    })
    .await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let response = client
        .post(server.url("/webhooks/subscriptions/"))
        .bearer_auth(&token)
        .json(&json!({ "name": "insecure", "url": "http://example.com/hook" }))
        .send()
        .await
        .expect("subscription create should respond");
    assert_eq!(response.status().as_u16(), 400);

    server.stop().await;
}
