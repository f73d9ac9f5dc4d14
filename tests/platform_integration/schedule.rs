use chrono::{Duration, Utc};
use serde_json::{Value, json};

use atrium_core::scheduler::sweep_once;

use super::support::{ServerHandle, signup, spawn_server, spawn_server_with};

async fn create_item(
    client: &reqwest::Client,
    server: &ServerHandle,
    token: &str,
    body: Value,
) -> Value {
    let response = client
        .post(server.url("/schedule/"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("schedule create should respond");
    assert_eq!(response.status().as_u16(), 201);
    response.json::<Value>().await.expect("item body should parse")
}

#[tokio::test]
async fn items_are_scoped_to_their_owner() {
    let server = spawn_server_with(|config| {
        config.admin_token = Some("root-token".to_owned());
    })
    .await;
    let client = reqwest::Client::new();
    let (_, ada) = signup(&client, &server, "ada").await;
    let (_, grace) = signup(&client, &server, "grace").await;

    create_item(
        &client,
        &server,
        &ada,
        json!({ "title": "standup", "start": Utc::now() + Duration::hours(1) }),
    )
    .await;

    let own = client
        .get(server.url("/schedule/"))
        .bearer_auth(&ada)
        .send()
        .await
        .expect("list should respond")
        .json::<Value>()
        .await
        .expect("list body should parse");
    assert_eq!(own.as_array().expect("array expected").len(), 1);

    let other = client
        .get(server.url("/schedule/"))
        .bearer_auth(&grace)
        .send()
        .await
        .expect("list should respond")
        .json::<Value>()
        .await
        .expect("list body should parse");
    assert_eq!(other.as_array().expect("array expected").len(), 0);

    let admin = client
        .get(server.url("/schedule/"))
        .bearer_auth("root-token")
        .send()
        .await
        .expect("list should respond")
        .json::<Value>()
        .await
        .expect("list body should parse");
    assert_eq!(admin.as_array().expect("array expected").len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn mutation_requires_ownership() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, ada) = signup(&client, &server, "ada").await;
    let (_, grace) = signup(&client, &server, "grace").await;

    let item = create_item(
        &client,
        &server,
        &ada,
        json!({ "title": "1:1", "start": Utc::now() + Duration::hours(2) }),
    )
    .await;
    let item_id = item["id"].as_str().expect("item id expected");

    let forbidden = client
        .patch(server.url(&format!("/schedule/{item_id}/")))
        .bearer_auth(&grace)
        .json(&json!({ "title": "hijacked" }))
        .send()
        .await
        .expect("update should respond");
    assert_eq!(forbidden.status().as_u16(), 403);

    // Reads are open to any authenticated principal.
    let read = client
        .get(server.url(&format!("/schedule/{item_id}/")))
        .bearer_auth(&grace)
        .send()
        .await
        .expect("get should respond");
    assert_eq!(read.status().as_u16(), 200);

    server.stop().await;
}

#[tokio::test]
async fn end_before_start_is_rejected() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ada").await;

    let start = Utc::now() + Duration::hours(2);
    let response = client
        .post(server.url("/schedule/"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "impossible",
            "start": start,
            "end": start - Duration::hours(1),
        }))
        .send()
        .await
        .expect("schedule create should respond");
    assert_eq!(response.status().as_u16(), 400);

    server.stop().await;
}

#[tokio::test]
async fn sweep_fires_each_due_reminder_exactly_once() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ada").await;

    create_item(
        &client,
        &server,
        &token,
        json!({
            "title": "due",
            "start": Utc::now() + Duration::hours(1),
            "reminder_at": Utc::now() - Duration::minutes(1),
        }),
    )
    .await;
    create_item(
        &client,
        &server,
        &token,
        json!({
            "title": "not due",
            "start": Utc::now() + Duration::hours(2),
            "reminder_at": Utc::now() + Duration::hours(1),
        }),
    )
    .await;
    create_item(
        &client,
        &server,
        &token,
        json!({
            "title": "cancelled",
            "start": Utc::now() + Duration::hours(1),
            "reminder_at": Utc::now() - Duration::minutes(1),
            "status": "cancelled",
        }),
    )
    .await;

    let fired = sweep_once(&server.state).await.expect("sweep should run");
    assert_eq!(fired, 1);
    assert_eq!(server.sink.count(), 1);

    // Later sweeps must not re-fire.
    let fired = sweep_once(&server.state).await.expect("sweep should run");
    assert_eq!(fired, 0);
    assert_eq!(server.sink.count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn concurrent_sweeps_emit_a_single_notification() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ada").await;

    create_item(
        &client,
        &server,
        &token,
        json!({
            "title": "due",
            "start": Utc::now() + Duration::hours(1),
            "reminder_at": Utc::now() - Duration::minutes(5),
        }),
    )
    .await;

    let (first, second) = tokio::join!(sweep_once(&server.state), sweep_once(&server.state));
    let total = first.expect("sweep should run") + second.expect("sweep should run");

    assert_eq!(total, 1, "the CAS admits exactly one sweeper");
    assert_eq!(server.sink.count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn mark_reminder_sent_is_idempotent() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ada").await;

    let item = create_item(
        &client,
        &server,
        &token,
        json!({
            "title": "manual",
            "start": Utc::now() + Duration::hours(1),
            "reminder_at": Utc::now() - Duration::minutes(1),
        }),
    )
    .await;
    let item_id = item["id"].as_str().expect("item id expected");

    let first = client
        .post(server.url(&format!("/schedule/{item_id}/mark_reminder_sent/")))
        .bearer_auth(&token)
        .send()
        .await
        .expect("mark should respond")
        .json::<Value>()
        .await
        .expect("mark body should parse");
    assert_eq!(first["reminder_sent"], true);
    assert_eq!(first["changed"], true);

    let second = client
        .post(server.url(&format!("/schedule/{item_id}/mark_reminder_sent/")))
        .bearer_auth(&token)
        .send()
        .await
        .expect("mark should respond")
        .json::<Value>()
        .await
        .expect("mark body should parse");
    assert_eq!(second["reminder_sent"], true);
    assert_eq!(second["changed"], false);

    // A marked item never fires from the sweep.
    let fired = sweep_once(&server.state).await.expect("sweep should run");
    assert_eq!(fired, 0);
    assert_eq!(server.sink.count(), 0);

    server.stop().await;
}
