use coordinator_testing_utils::FailureSwitches;
use serde_json::Value;

use super::test_utils::TestApp;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::spawn().await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "study-coordinator");
}

#[tokio::test]
async fn test_health_check_reports_store_failure() {
    let app = TestApp::spawn().await;
    app.mocks.set_failures(FailureSwitches {
        health: true,
        ..Default::default()
    });

    let response = app.get("/health").await;
    assert_eq!(response.status(), 503);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::spawn().await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/unknown").await;
    assert_eq!(response.status(), 404);
}
