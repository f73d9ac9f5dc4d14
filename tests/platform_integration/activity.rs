use serde_json::{Value, json};

use super::support::{signup, spawn_server};

#[tokio::test]
async fn single_events_and_batches_are_accepted() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let single = client
        .post(server.url("/activity/logs/"))
        .header("user-agent", "atrium-test/1.0")
        .json(&json!({
            "event_type": "page",
            "event_name": "dashboard.viewed",
            "payload": { "path": "/dashboard" },
        }))
        .send()
        .await
        .expect("activity post should respond");
    assert_eq!(single.status().as_u16(), 201);
    let created = single.json::<Vec<Value>>().await.expect("created body should parse");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["user_agent"], "atrium-test/1.0");
    assert!(created[0]["ip_address"].is_string());
    assert!(created[0]["created_at"].is_string());
    assert!(created[0]["user_id"].is_null(), "anonymous traffic has no attribution");

    let batch = client
        .post(server.url("/activity/logs/"))
        .json(&json!([
            { "event_type": "click", "event_name": "nav.projects" },
            { "event_type": "click", "event_name": "nav.teams" },
        ]))
        .send()
        .await
        .expect("activity post should respond");
    assert_eq!(batch.status().as_u16(), 201);
    assert_eq!(
        batch
            .json::<Vec<Value>>()
            .await
            .expect("batch body should parse")
            .len(),
        2
    );

    server.stop().await;
}

#[tokio::test]
async fn authenticated_events_carry_the_principal() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (principal_id, token) = signup(&client, &server, "ada").await;

    let response = client
        .post(server.url("/activity/logs/"))
        .bearer_auth(&token)
        .json(&json!({ "event_type": "auth", "event_name": "login.success" }))
        .send()
        .await
        .expect("activity post should respond");
    let created = response.json::<Vec<Value>>().await.expect("created body should parse");
    assert_eq!(created[0]["user_id"], principal_id.as_str());

    server.stop().await;
}

#[tokio::test]
async fn listing_is_newest_first() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    for name in ["first", "second", "third"] {
        let response = client
            .post(server.url("/activity/logs/"))
            .json(&json!({ "event_type": "seq", "event_name": name }))
            .send()
            .await
            .expect("activity post should respond");
        assert_eq!(response.status().as_u16(), 201);
    }

    let listed = client
        .get(server.url("/activity/logs/?limit=2"))
        .send()
        .await
        .expect("activity list should respond")
        .json::<Value>()
        .await
        .expect("list body should parse");

    assert_eq!(listed["count"], 2);
    let results = listed["results"].as_array().expect("results expected");
    assert_eq!(results[0]["event_name"], "third");
    assert_eq!(results[1]["event_name"], "second");

    server.stop().await;
}

#[tokio::test]
async fn malformed_entries_are_rejected() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/activity/logs/"))
        .json(&json!({ "event_type": "incomplete" }))
        .send()
        .await
        .expect("activity post should respond");
    assert_eq!(response.status().as_u16(), 400);

    server.stop().await;
}
