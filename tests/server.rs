mod common;

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

use common::{harness, FakePlatform, Harness};
use thread_harvest::config::Config;
use thread_harvest::pipeline::{MSG_CACHED, MSG_COMPLETED};
use thread_harvest::server::router;

async fn spawn(h: Harness) -> (SocketAddr, Arc<common::CountingIndex>) {
    let index = h.index.clone();
    let app = router(Arc::new(h.pipeline));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, index)
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let (addr, _) = spawn(harness(
        Config::minimal(tmp.path().join("runs")),
        FakePlatform::atlanta(),
    ))
    .await;

    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_fetch_and_search_then_cached() {
    let tmp = TempDir::new().unwrap();
    let (addr, index) = spawn(harness(
        Config::minimal(tmp.path().join("runs")),
        FakePlatform::atlanta(),
    ))
    .await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/fetch_and_search", addr);
    let payload = json!({ "query": "best tacos", "city": "Atlanta", "run_id": "atl" });

    let resp = client.post(&url).json(&payload).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], MSG_COMPLETED);
    assert_eq!(body["run_id"], "atl");
    assert!(body.get("answer").is_none());
    let output = body["output_filename"].as_str().unwrap().to_string();
    assert!(std::path::Path::new(&output).is_file());

    let body: Value = client
        .post(&url)
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], MSG_CACHED);
    assert_eq!(body["output_filename"], output.as_str());
    assert_eq!(index.upserts(), 1);

    let runs: Value = reqwest::get(format!("http://{}/runs", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let runs = runs["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["id"], "atl");
    assert_eq!(runs[0]["raw_artifact"], true);
    assert_eq!(runs[0]["index_built"], true);
    assert_eq!(runs[0]["search_artifacts"], 1);
}

#[tokio::test]
async fn test_blank_query_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let (addr, _) = spawn(harness(
        Config::minimal(tmp.path().join("runs")),
        FakePlatform::atlanta(),
    ))
    .await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/fetch_and_search", addr))
        .json(&json!({ "query": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(
        body["error"]["message"],
        "invalid input: query must not be empty"
    );
}

#[tokio::test]
async fn test_stage_failure_is_server_error() {
    let tmp = TempDir::new().unwrap();
    let platform = FakePlatform::atlanta();
    platform
        .fail_search
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let (addr, _) = spawn(harness(Config::minimal(tmp.path().join("runs")), platform)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/fetch_and_search", addr))
        .json(&json!({ "query": "best tacos", "run_id": "atl" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "stage_failed");
}
