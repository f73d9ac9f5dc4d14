use serde_json::{Value, json};

use super::support::{ServerHandle, signup, spawn_server};

async fn sync_rows(
    client: &reqwest::Client,
    server: &ServerHandle,
    token: &str,
    rows: Value,
) -> Value {
    let response = client
        .post(server.url("/resources/sync/"))
        .bearer_auth(token)
        .json(&json!({ "resources": rows }))
        .send()
        .await
        .expect("sync should respond");
    assert_eq!(response.status().as_u16(), 200);
    response.json::<Value>().await.expect("sync body should parse")
}

async fn list_resources(
    client: &reqwest::Client,
    server: &ServerHandle,
    token: &str,
    query: &str,
) -> Vec<Value> {
    let response = client
        .get(server.url(&format!("/resources/{query}")))
        .bearer_auth(token)
        .send()
        .await
        .expect("list should respond");
    assert_eq!(response.status().as_u16(), 200);
    response
        .json::<Vec<Value>>()
        .await
        .expect("list body should parse")
}

#[tokio::test]
async fn repeated_sync_updates_the_same_row() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let row = json!([{
        "resource_type": "pipeline",
        "external_id": "p-42",
        "name": "api-gateway-pipeline",
        "status": "running",
        "health_score": 90,
    }]);

    let first = sync_rows(&client, &server, &token, row.clone()).await;
    assert_eq!(first["synced"], 1);
    assert_eq!(first["errors"], 0);

    let second = sync_rows(&client, &server, &token, row).await;
    assert_eq!(second["synced"], 1);

    let resources = list_resources(&client, &server, &token, "?resource_type=pipeline").await;
    assert_eq!(resources.len(), 1, "two syncs, one catalog entry");
    assert_eq!(resources[0]["external_id"], "p-42");
    assert_eq!(resources[0]["status"], "running");
    assert_eq!(resources[0]["health_score"], 90);

    server.stop().await;
}

#[tokio::test]
async fn listing_filters_by_environment_and_search() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    sync_rows(
        &client,
        &server,
        &token,
        json!([
            {
                "resource_type": "container",
                "external_id": "c-1",
                "name": "payments-worker",
                "environment": "prod",
                "status": "failed",
            },
            {
                "resource_type": "container",
                "external_id": "c-2",
                "name": "search-indexer",
                "environment": "stage",
                "status": "running",
            }
        ]),
    )
    .await;

    let prod = list_resources(&client, &server, &token, "?environment=prod").await;
    assert_eq!(prod.len(), 1);
    assert_eq!(prod[0]["name"], "payments-worker");

    let searched = list_resources(&client, &server, &token, "?search=indexer").await;
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0]["name"], "search-indexer");

    server.stop().await;
}

#[tokio::test]
async fn provider_seed_populates_the_catalog() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let result = client
        .post(server.url("/resources/sync/"))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .expect("sync should respond")
        .json::<Value>()
        .await
        .expect("sync body should parse");
    assert_eq!(result["synced"], 3);

    let resources = list_resources(&client, &server, &token, "").await;
    assert_eq!(resources.len(), 3);
    assert!(
        resources
            .iter()
            .any(|resource| resource["resource_type"] == "load_balancer")
    );

    server.stop().await;
}

#[tokio::test]
async fn actions_validate_against_the_current_status() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    sync_rows(
        &client,
        &server,
        &token,
        json!([{
            "resource_type": "pipeline",
            "external_id": "p-7",
            "name": "nightly-build",
            "status": "running",
        }]),
    )
    .await;
    let resources = list_resources(&client, &server, &token, "").await;
    let resource_id = resources[0]["id"].as_str().expect("resource id expected");

    let unknown = client
        .post(server.url(&format!("/resources/{resource_id}/action/")))
        .bearer_auth(&token)
        .json(&json!({ "action": "defragment" }))
        .send()
        .await
        .expect("action should respond");
    assert_eq!(unknown.status().as_u16(), 400);

    // `rerun` only applies to failed resources.
    let conflict = client
        .post(server.url(&format!("/resources/{resource_id}/action/")))
        .bearer_auth(&token)
        .json(&json!({ "action": "rerun" }))
        .send()
        .await
        .expect("action should respond");
    assert_eq!(conflict.status().as_u16(), 409);

    let stopped = client
        .post(server.url(&format!("/resources/{resource_id}/action/")))
        .bearer_auth(&token)
        .json(&json!({ "action": "stop" }))
        .send()
        .await
        .expect("action should respond")
        .json::<Value>()
        .await
        .expect("action body should parse");
    assert_eq!(stopped["ok"], true);
    assert_eq!(stopped["status"], "stopped");

    server.stop().await;
}

#[tokio::test]
async fn simulated_load_balancer_metrics_match_the_fixed_formulas() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (_, token) = signup(&client, &server, "ops").await;

    let metrics = client
        .get(server.url("/infra/load-balancers/metrics/?name=alpha"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("metrics should respond")
        .json::<Value>()
        .await
        .expect("metrics body should parse");

    // "alpha" seeds to 18.
    assert_eq!(metrics["latency_ms_p50"], 43);
    assert_eq!(metrics["latency_ms_p95"], 73);
    assert_eq!(metrics["request_rate_rps"], 174);
    assert_eq!(metrics["error_rate_percent"], 0.6);

    server.stop().await;
}

#[tokio::test]
async fn provisioning_lands_in_the_catalog_as_simulated() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();
    let (principal_id, token) = signup(&client, &server, "ops").await;

    let provisioned = client
        .post(server.url("/infra/load-balancers/"))
        .bearer_auth(&token)
        .json(&json!({ "name": "edge router" }))
        .send()
        .await
        .expect("provision should respond");
    assert_eq!(provisioned.status().as_u16(), 201);
    let body = provisioned.json::<Value>().await.expect("provision body should parse");

    assert_eq!(body["provider"], "simulated");
    assert_eq!(body["status"], "running");
    let dns_name = body["dns_name"].as_str().expect("dns name expected");
    assert!(dns_name.starts_with("edge-router-"));
    assert!(dns_name.ends_with(".lb.atrium.cloud"));

    let resources = list_resources(&client, &server, &token, "?resource_type=load_balancer").await;
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["owner_id"], principal_id.as_str());
    assert_eq!(resources[0]["metadata"]["provider"], "simulated");

    server.stop().await;
}
