use coordinator_core::AssignmentStatus;
use serde_json::{json, Value};

use super::test_utils::TestApp;

#[tokio::test]
async fn test_list_workers() {
    let app = TestApp::spawn().await;
    app.heartbeat("10.0.0.5", "node-a").await;
    app.clock.advance_secs(1);
    app.heartbeat("10.0.0.6", "node-b").await;

    let response = app.get("/api/workers").await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let workers = body["data"].as_array().unwrap();
    assert_eq!(workers.len(), 2);
    assert_eq!(workers[0]["hostname"], "node-b");
    assert_eq!(workers[0]["isAlive"], true);
    assert_eq!(workers[1]["networkId"], "10.0.0.5");
}

#[tokio::test]
async fn test_list_workers_hides_stale_sessions_by_default() {
    let app = TestApp::spawn().await;
    app.heartbeat("10.0.0.5", "node-a").await;
    app.clock.advance_secs(16);
    app.heartbeat("10.0.0.5", "node-a").await;

    let body: Value = app.get("/api/workers").await.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let body: Value = app
        .get("/api/workers?includeStale=true")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_worker_status() {
    let app = TestApp::spawn().await;
    let summary = app.heartbeat("10.0.0.5", "node-a").await;
    let session_id = summary["sessionId"].as_str().unwrap();

    app.post_json(
        "/api/progress",
        json!({
            "networkId": "10.0.0.5",
            "message": { "type": "stage_progress", "name": "meshing", "current": 1, "total": 4 }
        }),
    )
    .await;

    let response = app.get(&format!("/api/workers/{session_id}")).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["session"]["id"], session_id);
    assert_eq!(body["data"]["session"]["status"], "RUNNING");
    assert_eq!(body["data"]["liveState"]["stage"], "meshing");
    assert_eq!(body["data"]["liveState"]["stageProgress"], 25.0);
    assert_eq!(body["data"]["recentEvents"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_unknown_worker() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/workers/nope").await;
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "WORKER_NOT_FOUND");
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn test_delete_worker_resets_assignments() {
    let app = TestApp::spawn().await;
    let (_, ids) = app.create_study("rotor-batch", 1).await;
    let summary = app.heartbeat("10.0.0.5", "node-a").await;
    let session_id = summary["sessionId"].as_str().unwrap();
    app.post_json(
        &format!("/api/assignments/{}/claim", ids[0]),
        json!({ "networkId": "10.0.0.5" }),
    )
    .await;

    let response = app.delete(&format!("/api/workers/{session_id}")).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["resetAssignments"], json!([ids[0]]));
    assert!(app.mocks.worker(session_id).is_none());

    let assignment = app.mocks.assignment(&ids[0]).unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Pending);
    assert!(assignment.worker_id.is_none());

    let response = app.delete(&format!("/api/workers/{session_id}")).await;
    assert_eq!(response.status(), 404);
}
