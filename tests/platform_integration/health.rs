use serde_json::Value;

use super::support::spawn_server;

#[tokio::test]
async fn health_ready_and_info_round_trip() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let health = client
        .get(server.url("/healthz"))
        .send()
        .await
        .expect("healthz should respond")
        .json::<Value>()
        .await
        .expect("healthz body should parse");
    assert_eq!(health["ok"], true);
    assert_eq!(health["principals"], 0);
    assert_eq!(health["provider_configured"], false);

    let ready = client
        .get(server.url("/readyz"))
        .send()
        .await
        .expect("readyz should respond")
        .json::<Value>()
        .await
        .expect("readyz body should parse");
    assert_eq!(ready["ready"], true);

    let info = client
        .get(server.url("/info"))
        .send()
        .await
        .expect("info should respond")
        .json::<Value>()
        .await
        .expect("info body should parse");
    assert_eq!(info["name"], "atrium-core");
    assert_eq!(info["version"], "test");

    server.stop().await;
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected_where_required() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let me = client
        .get(server.url("/auth/me/"))
        .send()
        .await
        .expect("me should respond");
    assert_eq!(me.status().as_u16(), 401);

    let schedule = client
        .get(server.url("/schedule/"))
        .send()
        .await
        .expect("schedule should respond");
    assert_eq!(schedule.status().as_u16(), 401);

    let resources = client
        .get(server.url("/resources/"))
        .send()
        .await
        .expect("resources should respond");
    assert_eq!(resources.status().as_u16(), 401);

    server.stop().await;
}

#[tokio::test]
async fn signup_conflicts_on_duplicate_username() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let first = client
        .post(server.url("/auth/signup/"))
        .json(&serde_json::json!({ "username": "ada" }))
        .send()
        .await
        .expect("signup should respond");
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(server.url("/auth/signup/"))
        .json(&serde_json::json!({ "username": "ada" }))
        .send()
        .await
        .expect("signup should respond");
    assert_eq!(second.status().as_u16(), 409);

    let body = second.json::<Value>().await.expect("error body should parse");
    assert_eq!(body["error"]["code"], "conflict");

    server.stop().await;
}
