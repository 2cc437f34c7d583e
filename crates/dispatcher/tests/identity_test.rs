use std::sync::Arc;

use coordinator_core::{ErrorKind, HardwareInfo, WorkerStatus};
use coordinator_dispatcher::CoordinatorController;
use coordinator_testing_utils::{ManualClock, MockStore, WorkerSessionBuilder};
use serde_json::json;

fn setup() -> (MockStore, ManualClock, CoordinatorController) {
    let mocks = MockStore::new();
    let clock = ManualClock::starting_now();
    let controller = CoordinatorController::new(mocks.store(), Arc::new(clock.clone()), None, None);
    (mocks, clock, controller)
}

async fn seed_study(controller: &CoordinatorController, count: usize) -> Vec<String> {
    let created = controller
        .create_super_study(coordinator_core::NewSuperStudy {
            name: "wing-sweep".to_string(),
            description: None,
            base_config: None,
            assignments: (0..count).map(|i| json!({ "case": i })).collect(),
        })
        .await
        .unwrap();
    created.assignments.into_iter().map(|a| a.id).collect()
}

#[tokio::test]
async fn test_heartbeats_within_timeout_keep_one_session() {
    let (mocks, clock, controller) = setup();

    let first = controller
        .heartbeat("10.0.0.5", Some("node-a"), None)
        .await
        .unwrap();
    assert!(first.is_new_session);

    for _ in 0..10 {
        clock.advance_secs(14);
        let summary = controller
            .heartbeat("10.0.0.5", Some("node-a"), None)
            .await
            .unwrap();
        assert_eq!(summary.session_id, first.session_id);
        assert!(!summary.is_new_session);
    }

    let active = mocks.active_workers_for("10.0.0.5");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, first.session_id);
    assert_eq!(mocks.all_workers().len(), 1);
}

#[tokio::test]
async fn test_heartbeat_after_idle_timeout_starts_new_session() {
    let (mocks, clock, controller) = setup();

    let first = controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    clock.advance_secs(16);
    let second = controller.heartbeat("10.0.0.5", None, None).await.unwrap();

    assert!(second.is_new_session);
    assert_ne!(second.session_id, first.session_id);
    assert!(second.superseded_sessions.contains(&first.session_id));
    assert!(mocks.worker(&first.session_id).unwrap().is_stale);

    let active = mocks.active_workers_for("10.0.0.5");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.session_id);
}

#[tokio::test]
async fn test_lease_survives_reconnect() {
    let (mocks, clock, controller) = setup();
    let ids = seed_study(&controller, 1).await;

    let original = controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    controller.claim(&ids[0], "10.0.0.5").await.unwrap();

    clock.advance_secs(61);
    let reconnect = controller
        .heartbeat("10.0.0.5", Some("node-a"), None)
        .await
        .unwrap();

    assert!(reconnect.is_new_session);
    assert_ne!(reconnect.session_id, original.session_id);
    assert_eq!(reconnect.transferred_assignments, vec![ids[0].clone()]);
    assert_eq!(reconnect.status, WorkerStatus::Running);
    assert!(mocks.worker(&original.session_id).unwrap().is_stale);

    let assignment = mocks.assignment(&ids[0]).unwrap();
    assert!(assignment.is_running());
    assert_eq!(assignment.worker_id.as_deref(), Some(reconnect.session_id.as_str()));

    let view = controller.assignment_status(&assignment.super_study_id).await.unwrap();
    assert_eq!(view.counts.running, 1);
    assert_eq!(
        view.assignments[0].assignment.worker_id.as_deref(),
        Some(reconnect.session_id.as_str())
    );
}

#[tokio::test]
async fn test_running_session_tolerates_sixty_seconds() {
    let (_mocks, clock, controller) = setup();
    let ids = seed_study(&controller, 1).await;

    let first = controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    controller.claim(&ids[0], "10.0.0.5").await.unwrap();

    clock.advance_secs(45);
    let again = controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    assert_eq!(again.session_id, first.session_id);
    assert!(!again.is_new_session);
}

#[tokio::test]
async fn test_heartbeat_adopts_claim_only_session() {
    let (mocks, clock, controller) = setup();
    let ids = seed_study(&controller, 1).await;

    let claimed = controller.claim(&ids[0], "vpn-placeholder").await.unwrap();
    let claimant_id = claimed.worker_id.clone().unwrap();
    assert!(mocks.worker(&claimant_id).unwrap().provisional);

    clock.advance_secs(30);
    let hardware = HardwareInfo {
        gpu_name: Some("RTX 4090".to_string()),
        cpu_cores: Some(32),
        total_ram_gb: Some(128.0),
    };
    let summary = controller
        .heartbeat("10.0.0.5", Some("node-a"), Some(&hardware))
        .await
        .unwrap();

    assert_eq!(summary.session_id, claimant_id);
    assert!(!summary.is_new_session);

    let session = mocks.worker(&claimant_id).unwrap();
    assert_eq!(session.network_id, "10.0.0.5");
    assert_eq!(session.hostname.as_deref(), Some("node-a"));
    assert_eq!(session.hardware, hardware);
    assert!(!session.provisional);
}

#[tokio::test]
async fn test_hostname_adoption_follows_ip_change() {
    let (mocks, clock, controller) = setup();

    let first = controller
        .heartbeat("10.0.0.5", Some("node-a"), None)
        .await
        .unwrap();
    clock.advance_secs(10);
    let moved = controller
        .heartbeat("10.0.0.77", Some("node-a"), None)
        .await
        .unwrap();

    assert_eq!(moved.session_id, first.session_id);
    assert_eq!(moved.network_id, "10.0.0.77");
    assert_eq!(mocks.all_workers().len(), 1);
}

#[tokio::test]
async fn test_hostname_adoption_outlasts_liveness_timeouts() {
    let (mocks, clock, controller) = setup();
    let ids = seed_study(&controller, 1).await;

    let first = controller
        .heartbeat("10.0.0.5", Some("node-a"), None)
        .await
        .unwrap();
    controller.claim(&ids[0], "10.0.0.5").await.unwrap();

    clock.advance_secs(120);
    let moved = controller
        .heartbeat("10.0.0.77", Some("node-a"), None)
        .await
        .unwrap();

    assert_eq!(moved.session_id, first.session_id);
    assert!(!moved.is_new_session);
    assert_eq!(moved.network_id, "10.0.0.77");
    assert!(!mocks.worker(&first.session_id).unwrap().is_stale);
    assert_eq!(
        mocks.assignment(&ids[0]).unwrap().worker_id.as_deref(),
        Some(first.session_id.as_str())
    );
}

#[tokio::test]
async fn test_hostname_match_outside_window_is_not_reused() {
    let (mocks, clock, controller) = setup();

    let first = controller
        .heartbeat("10.0.0.5", Some("node-a"), None)
        .await
        .unwrap();
    clock.advance_secs(301);
    let moved = controller
        .heartbeat("10.0.0.77", Some("node-a"), None)
        .await
        .unwrap();

    assert!(moved.is_new_session);
    assert_ne!(moved.session_id, first.session_id);
    assert_eq!(mocks.worker(&first.session_id).unwrap().network_id, "10.0.0.5");
}

#[tokio::test]
async fn test_provisional_session_survives_short_silence() {
    let (_mocks, clock, controller) = setup();
    let ids = seed_study(&controller, 1).await;

    let claimed = controller.claim(&ids[0], "10.0.0.5").await.unwrap();
    let claimant_id = claimed.worker_id.unwrap();

    clock.advance_secs(200);
    let summary = controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    assert_eq!(summary.session_id, claimant_id);
    assert!(!summary.is_new_session);
}

#[tokio::test]
async fn test_provisional_session_expires_after_five_minutes() {
    let (mocks, clock, controller) = setup();
    let ids = seed_study(&controller, 1).await;

    let claimed = controller.claim(&ids[0], "10.0.0.5").await.unwrap();
    let claimant_id = claimed.worker_id.unwrap();

    clock.advance_secs(301);
    let reconnect = controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    assert!(reconnect.is_new_session);
    assert!(mocks.worker(&claimant_id).unwrap().is_stale);
    assert_eq!(reconnect.transferred_assignments, vec![ids[0].clone()]);
}

#[tokio::test]
async fn test_new_session_supersedes_duplicates() {
    let (mocks, clock, controller) = setup();
    let old = clock.ago(30);
    let a = WorkerSessionBuilder::new("10.0.0.5", old).with_id("dup-a").build();
    let b = WorkerSessionBuilder::new("10.0.0.5", old)
        .with_id("dup-b")
        .last_seen(clock.ago(25))
        .build();
    mocks.insert_worker(a);
    mocks.insert_worker(b);

    let summary = controller.heartbeat("10.0.0.5", None, None).await.unwrap();

    assert!(summary.is_new_session);
    let mut retired = summary.superseded_sessions.clone();
    retired.sort();
    assert_eq!(retired, vec!["dup-a".to_string(), "dup-b".to_string()]);

    let active = mocks.active_workers_for("10.0.0.5");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, summary.session_id);
}

#[tokio::test]
async fn test_missing_network_id_is_validation_error() {
    let (_mocks, _clock, controller) = setup();

    let err = controller.heartbeat("  ", None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.is_retryable());
}
