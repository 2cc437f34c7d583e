use serde_json::{json, Value};

use super::test_utils::TestApp;

async fn claim(app: &TestApp, assignment_id: &str, network_id: &str) {
    let response = app
        .post_json(
            &format!("/api/assignments/{assignment_id}/claim"),
            json!({ "networkId": network_id }),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_progress_updates_assignment() {
    let app = TestApp::spawn().await;
    let (study_id, ids) = app.create_study("rotor-batch", 2).await;
    app.heartbeat("10.0.0.5", "node-a").await;
    claim(&app, &ids[0], "10.0.0.5").await;

    let response = app
        .post_json(
            "/api/progress",
            json!({
                "networkId": "10.0.0.5",
                "message": { "type": "overall_progress", "current": 1, "total": 2 }
            }),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["assignmentId"], ids[0].as_str());
    assert_eq!(body["data"]["status"], "RUNNING");

    let body: Value = app
        .get(&format!("/api/super-studies/{study_id}/assignments"))
        .await
        .json()
        .await
        .unwrap();
    let first = &body["data"]["assignments"][0];
    assert_eq!(first["id"], ids[0].as_str());
    assert_eq!(first["progress"], 50.0);
    assert_eq!(body["data"]["counts"]["running"], 1);
    assert_eq!(body["data"]["counts"]["pending"], 1);
}

#[tokio::test]
async fn test_finished_report_completes_assignment() {
    let app = TestApp::spawn().await;
    let (study_id, ids) = app.create_study("rotor-batch", 1).await;
    app.heartbeat("10.0.0.5", "node-a").await;
    claim(&app, &ids[0], "10.0.0.5").await;

    let response = app
        .post_json(
            "/api/progress",
            json!({ "machineId": "10.0.0.5", "message": { "type": "finished" } }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let assignment = app.mocks.assignment(&ids[0]).unwrap();
    assert_eq!(assignment.progress, 100.0);
    assert!(assignment.completed_at.is_some());

    let study = app.mocks.study(&study_id).unwrap();
    assert_eq!(study.completed_assignments, 1);
}

#[tokio::test]
async fn test_invalid_progress_message_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/progress",
            json!({ "networkId": "10.0.0.5", "message": { "type": "bogus" } }),
        )
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "BAD_REQUEST");
    assert!(app.mocks.all_workers().is_empty());
}

#[tokio::test]
async fn test_progress_without_network_id_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/progress",
            json!({ "message": { "type": "status", "message": "hello" } }),
        )
        .await;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_status_report_recorded_in_live_state() {
    let app = TestApp::spawn().await;
    let summary = app.heartbeat("10.0.0.5", "node-a").await;

    let response = app
        .post_json(
            "/api/progress",
            json!({
                "networkId": "10.0.0.5",
                "message": { "type": "status", "message": "网格加密", "log_type": "warning" },
                "timestamp": "2025-01-01T12:00:00Z"
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let session_id = summary["sessionId"].as_str().unwrap();
    let live = app.mocks.live_state(session_id).unwrap();
    assert_eq!(live.warning_count, 1);
    assert_eq!(live.log_messages.len(), 1);
    assert_eq!(live.log_messages[0].message, "网格加密");
}
