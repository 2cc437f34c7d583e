use coordinator_core::{AssignmentStatus, WorkerStatus};
use serde_json::{json, Value};

use super::test_utils::TestApp;

#[tokio::test]
async fn test_create_super_study() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/super-studies",
            json!({
                "name": "rotor-batch",
                "description": "叶片角度扫描",
                "baseConfig": { "solver": "k-omega" },
                "assignments": [{ "pitch": 5 }, { "pitch": 10 }, { "pitch": 15 }]
            }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let data = &body["data"];
    assert_eq!(data["name"], "rotor-batch");
    assert_eq!(data["status"], "PENDING");
    assert_eq!(data["totalAssignments"], 3);
    assert_eq!(data["baseConfig"]["solver"], "k-omega");

    let assignments = data["assignments"].as_array().unwrap();
    assert_eq!(assignments.len(), 3);
    for (i, assignment) in assignments.iter().enumerate() {
        assert_eq!(assignment["index"], i);
        assert_eq!(assignment["status"], "PENDING");
    }
    assert_eq!(assignments[2]["config"]["pitch"], 15);
}

#[tokio::test]
async fn test_create_super_study_requires_name() {
    let app = TestApp::spawn().await;

    let response = app
        .post_json(
            "/api/super-studies",
            json!({ "name": "  ", "assignments": [] }),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_list_super_studies_with_filter() {
    let app = TestApp::spawn().await;
    app.create_study("rotor-sweep", 1).await;
    app.clock.advance_secs(1);
    app.create_study("wing-sweep", 1).await;
    app.clock.advance_secs(1);
    app.create_study("rotor-fine", 1).await;

    let body: Value = app.get("/api/super-studies").await.json().await.unwrap();
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["rotor-fine", "wing-sweep", "rotor-sweep"]);

    let body: Value = app
        .get("/api/super-studies?name=rotor")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_super_study_repairs_assignment_of_idle_worker() {
    let app = TestApp::spawn().await;
    let (study_id, ids) = app.create_study("rotor-batch", 1).await;
    let summary = app.heartbeat("10.0.0.5", "node-a").await;
    app.post_json(
        &format!("/api/assignments/{}/claim", ids[0]),
        json!({ "networkId": "10.0.0.5" }),
    )
    .await;

    // 完成上报丢失：会话已回到空闲，作业仍记录为运行中
    let mut session = app
        .mocks
        .worker(summary["sessionId"].as_str().unwrap())
        .unwrap();
    session.status = WorkerStatus::Idle;
    app.mocks.insert_worker(session);

    let response = app.get(&format!("/api/super-studies/{study_id}")).await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let assignment = &body["data"]["assignments"][0];
    assert_eq!(assignment["status"], "PENDING");
    assert_eq!(assignment["storedStatus"], "RUNNING");
    assert_eq!(assignment["repaired"], true);
    assert_eq!(body["data"]["counts"]["pending"], 1);
    assert_eq!(body["data"]["superStudy"]["id"], study_id.as_str());

    let stored = app.mocks.assignment(&ids[0]).unwrap();
    assert_eq!(stored.status, AssignmentStatus::Pending);
}

#[tokio::test]
async fn test_delete_super_study() {
    let app = TestApp::spawn().await;
    let (study_id, ids) = app.create_study("rotor-batch", 2).await;

    let response = app.delete(&format!("/api/super-studies/{study_id}")).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["data"].is_null());

    assert!(app.mocks.study(&study_id).is_none());
    assert!(app.mocks.assignment(&ids[0]).is_none());

    let response = app.get(&format!("/api/super-studies/{study_id}")).await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "SUPER_STUDY_NOT_FOUND");

    let response = app.delete(&format!("/api/super-studies/{study_id}")).await;
    assert_eq!(response.status(), 404);
}
