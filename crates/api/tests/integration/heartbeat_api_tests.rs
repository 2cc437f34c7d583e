use serde_json::{json, Value};

use super::test_utils::TestApp;

#[tokio::test]
async fn test_heartbeat_creates_session() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/heartbeat",
            json!({
                "networkId": "10.0.0.5",
                "hostname": "node-a",
                "gpuName": "RTX 4090",
                "cpuCores": 32,
                "totalRamGB": 128
            }),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["isNewSession"], true);
    assert_eq!(body["data"]["networkId"], "10.0.0.5");
    assert_eq!(body["data"]["status"], "IDLE");

    let session_id = body["data"]["sessionId"].as_str().unwrap();
    let stored = app.mocks.worker(session_id).unwrap();
    assert_eq!(stored.hardware.gpu_name.as_deref(), Some("RTX 4090"));
    assert_eq!(stored.hardware.cpu_cores, Some(32));
}

#[tokio::test]
async fn test_heartbeat_accepts_legacy_machine_id() {
    let app = TestApp::spawn().await;

    let first = app
        .post_json("/api/heartbeat", json!({ "machineId": "10.0.0.9" }))
        .await;
    assert_eq!(first.status(), 200);
    let first: Value = first.json().await.unwrap();

    let second = app.heartbeat("10.0.0.9", "").await;
    assert_eq!(second["isNewSession"], false);
    assert_eq!(second["sessionId"], first["data"]["sessionId"]);
}

#[tokio::test]
async fn test_heartbeat_without_network_id_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json("/api/heartbeat", json!({ "hostname": "node-a" }))
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_heartbeat_lookup() {
    let app = TestApp::spawn().await;
    let summary = app.heartbeat("10.0.0.5", "node-a").await;

    let response = app.get("/api/heartbeat?networkId=10.0.0.5").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["session"]["id"], summary["sessionId"]);
    assert_eq!(body["data"]["isOffline"], false);
    assert_eq!(body["data"]["runningAssignments"], json!([]));

    app.clock.advance_secs(31);
    let body: Value = app
        .get("/api/heartbeat?networkId=10.0.0.5")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["isOffline"], true);
}

#[tokio::test]
async fn test_heartbeat_lookup_unknown_network() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/heartbeat?networkId=10.9.9.9").await;
    assert_eq!(response.status(), 404);

    let response = app.get("/api/heartbeat").await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_claim_assignment() {
    let app = TestApp::spawn().await;
    let (_, ids) = app.create_study("rotor-batch", 2).await;
    let summary = app.heartbeat("10.0.0.5", "node-a").await;

    let response = app
        .post_json(
            &format!("/api/assignments/{}/claim", ids[0]),
            json!({ "networkId": "10.0.0.5" }),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["status"], "RUNNING");
    assert_eq!(body["data"]["workerId"], summary["sessionId"]);
    assert!(body["data"]["startedAt"].is_string());
}

#[tokio::test]
async fn test_claim_unknown_assignment() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/assignments/does-not-exist/claim",
            json!({ "networkId": "10.0.0.5" }),
        )
        .await;

    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "ASSIGNMENT_NOT_FOUND");
}
