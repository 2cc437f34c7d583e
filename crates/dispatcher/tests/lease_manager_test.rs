use std::sync::Arc;

use coordinator_core::{
    AssignmentStatus, CoordinatorError, NewSuperStudy, ProgressReport, SuperStudyStatus,
    WorkerStatus,
};
use coordinator_dispatcher::CoordinatorController;
use coordinator_testing_utils::{
    AssignmentBuilder, ManualClock, MockStore, SuperStudyBuilder, WorkerSessionBuilder,
};
use serde_json::json;

fn setup() -> (MockStore, ManualClock, CoordinatorController) {
    let mocks = MockStore::new();
    let clock = ManualClock::starting_now();
    let controller = CoordinatorController::new(mocks.store(), Arc::new(clock.clone()), None, None);
    (mocks, clock, controller)
}

async fn seed_study(controller: &CoordinatorController, count: usize) -> (String, Vec<String>) {
    let created = controller
        .create_super_study(NewSuperStudy {
            name: "rotor-batch".to_string(),
            description: Some("blade pitch sweep".to_string()),
            base_config: Some(json!({ "solver": "rans" })),
            assignments: (0..count).map(|i| json!({ "pitch": i })).collect(),
        })
        .await
        .unwrap();
    let ids = created.assignments.iter().map(|a| a.id.clone()).collect();
    (created.super_study.id, ids)
}

#[tokio::test]
async fn test_create_super_study_builds_ordered_pending_assignments() {
    let (mocks, _clock, controller) = setup();
    let (study_id, ids) = seed_study(&controller, 3).await;

    let study = mocks.study(&study_id).unwrap();
    assert_eq!(study.total_assignments, 3);
    assert_eq!(study.status, SuperStudyStatus::Pending);

    for (index, id) in ids.iter().enumerate() {
        let assignment = mocks.assignment(id).unwrap();
        assert_eq!(assignment.index, index as i32);
        assert_eq!(assignment.status, AssignmentStatus::Pending);
        assert_eq!(assignment.config, json!({ "pitch": index }));
    }
}

#[tokio::test]
async fn test_create_super_study_requires_name() {
    let (_mocks, _clock, controller) = setup();
    let err = controller
        .create_super_study(NewSuperStudy {
            name: " ".to_string(),
            description: None,
            base_config: None,
            assignments: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Validation(_)));
}

#[tokio::test]
async fn test_claim_unknown_assignment_is_not_found() {
    let (mocks, _clock, controller) = setup();
    let err = controller.claim("missing", "10.0.0.5").await.unwrap_err();
    assert!(matches!(err, CoordinatorError::AssignmentNotFound { .. }));
    assert!(mocks.all_workers().is_empty());
}

#[tokio::test]
async fn test_claim_leases_assignment_and_starts_study() {
    let (mocks, clock, controller) = setup();
    let (study_id, ids) = seed_study(&controller, 2).await;
    let summary = controller.heartbeat("10.0.0.5", Some("node-a"), None).await.unwrap();

    clock.advance_secs(3);
    let assignment = controller.claim(&ids[0], "10.0.0.5").await.unwrap();

    assert_eq!(assignment.status, AssignmentStatus::Running);
    assert_eq!(assignment.worker_id.as_deref(), Some(summary.session_id.as_str()));
    assert_eq!(assignment.started_at, Some(clock.ago(0)));

    let session = mocks.worker(&summary.session_id).unwrap();
    assert_eq!(session.status, WorkerStatus::Running);
    assert_eq!(session.last_seen, clock.ago(0));

    assert_eq!(mocks.study(&study_id).unwrap().status, SuperStudyStatus::Running);
}

#[tokio::test]
async fn test_reclaim_reassigns_to_last_claimant() {
    let (mocks, _clock, controller) = setup();
    let (_study_id, ids) = seed_study(&controller, 1).await;

    let first = controller.claim(&ids[0], "10.0.0.5").await.unwrap();
    let second = controller.claim(&ids[0], "10.0.0.6").await.unwrap();

    assert_ne!(first.worker_id, second.worker_id);
    let stored = mocks.assignment(&ids[0]).unwrap();
    assert_eq!(stored.worker_id, second.worker_id);
    assert!(stored.is_running());
}

#[tokio::test]
async fn test_finished_report_completes_and_rolls_up() {
    let (mocks, clock, controller) = setup();
    let (study_id, ids) = seed_study(&controller, 2).await;

    controller.heartbeat("10.0.0.5", None, None).await.unwrap();
    controller.claim(&ids[0], "10.0.0.5").await.unwrap();
    let before = mocks.study(&study_id).unwrap().completed_assignments;

    clock.advance_secs(5);
    let outcome = controller
        .report_progress("10.0.0.5", &ProgressReport::Finished { message: None }, None)
        .await
        .unwrap();
    assert_eq!(outcome.status, WorkerStatus::Idle);

    let assignment = mocks.assignment(&ids[0]).unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Completed);
    assert_eq!(assignment.progress, 100.0);
    assert_eq!(assignment.completed_at, Some(clock.ago(0)));

    let study = mocks.study(&study_id).unwrap();
    assert_eq!(study.completed_assignments, before + 1);
    assert_eq!(
        study.master_progress,
        100.0 * f64::from(study.completed_assignments) / f64::from(study.total_assignments)
    );

    let session = mocks.worker(&outcome.session_id).unwrap();
    assert_eq!(session.status, WorkerStatus::Idle);
}

#[tokio::test]
async fn test_finishing_every_assignment_completes_study() {
    let (mocks, _clock, controller) = setup();
    let (study_id, ids) = seed_study(&controller, 2).await;

    for id in &ids {
        controller.claim(id, "10.0.0.5").await.unwrap();
        controller
            .report_progress("10.0.0.5", &ProgressReport::Finished { message: None }, None)
            .await
            .unwrap();
    }

    let study = mocks.study(&study_id).unwrap();
    assert_eq!(study.completed_assignments, 2);
    assert_eq!(study.master_progress, 100.0);
    assert_eq!(study.status, SuperStudyStatus::Completed);
}

#[tokio::test]
async fn test_reclaiming_finished_assignment_rolls_study_back() {
    let (mocks, _clock, controller) = setup();
    let (study_id, ids) = seed_study(&controller, 1).await;

    controller.claim(&ids[0], "10.0.0.5").await.unwrap();
    controller
        .report_progress("10.0.0.5", &ProgressReport::Finished { message: None }, None)
        .await
        .unwrap();
    assert_eq!(
        mocks.study(&study_id).unwrap().status,
        SuperStudyStatus::Completed
    );

    let reclaimed = controller.claim(&ids[0], "10.0.0.6").await.unwrap();
    assert!(reclaimed.is_running());

    let study = mocks.study(&study_id).unwrap();
    assert_eq!(study.status, SuperStudyStatus::Running);
    assert_eq!(study.completed_assignments, 0);
    assert_eq!(study.master_progress, 0.0);
}

#[tokio::test]
async fn test_fatal_error_marks_session_only() {
    let (mocks, _clock, controller) = setup();
    let (_study_id, ids) = seed_study(&controller, 1).await;

    controller.claim(&ids[0], "10.0.0.5").await.unwrap();
    let outcome = controller
        .report_progress(
            "10.0.0.5",
            &ProgressReport::FatalError {
                message: Some("segfault in solver".to_string()),
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(mocks.worker(&outcome.session_id).unwrap().status, WorkerStatus::Error);
    assert!(mocks.assignment(&ids[0]).unwrap().is_running());
    assert_eq!(mocks.live_state(&outcome.session_id).unwrap().error_count, 1);
}

#[tokio::test]
async fn test_delete_worker_resets_all_owned_assignments() {
    let (mocks, clock, controller) = setup();
    let now = clock.ago(0);

    let worker = WorkerSessionBuilder::new("10.0.0.5", now)
        .with_id("w-1")
        .with_status(WorkerStatus::Running)
        .build();
    mocks.insert_worker(worker);

    mocks.insert_study(SuperStudyBuilder::new("first", 2, now).with_id("s-1").build());
    mocks.insert_study(
        SuperStudyBuilder::new("second", 2, now)
            .with_id("s-2")
            .with_status(SuperStudyStatus::Running)
            .build(),
    );

    mocks.insert_assignment(
        AssignmentBuilder::new("s-1", 0)
            .with_id("a-run")
            .running_on("w-1", now)
            .with_progress(40.0)
            .build(),
    );
    mocks.insert_assignment(
        AssignmentBuilder::new("s-1", 1)
            .with_id("a-pend-1")
            .with_worker("w-1")
            .build(),
    );
    mocks.insert_assignment(
        AssignmentBuilder::new("s-2", 0)
            .with_id("a-pend-2")
            .with_worker("w-1")
            .build(),
    );
    mocks.insert_assignment(
        AssignmentBuilder::new("s-2", 1)
            .with_id("a-done")
            .with_status(AssignmentStatus::Completed)
            .completed_at(now)
            .with_progress(100.0)
            .build(),
    );

    let deleted = controller.delete_worker("w-1").await.unwrap();
    let mut reset = deleted.reset_assignments.clone();
    reset.sort();
    assert_eq!(reset, vec!["a-pend-1", "a-pend-2", "a-run"]);

    for id in ["a-run", "a-pend-1", "a-pend-2"] {
        let assignment = mocks.assignment(id).unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Pending);
        assert!(assignment.worker_id.is_none());
        assert_eq!(assignment.progress, 0.0);
        assert!(assignment.current_stage.is_none());
        assert!(assignment.eta.is_none());
        assert!(assignment.started_at.is_none());
        assert!(assignment.completed_at.is_none());
    }

    let first = mocks.study("s-1").unwrap();
    assert_eq!(first.completed_assignments, 0);
    assert_eq!(first.status, SuperStudyStatus::Pending);

    let second = mocks.study("s-2").unwrap();
    assert_eq!(second.completed_assignments, 1);
    assert_eq!(second.master_progress, 50.0);
    assert_eq!(second.status, SuperStudyStatus::Pending);

    assert!(mocks.worker("w-1").is_none());
}

#[tokio::test]
async fn test_delete_unknown_worker_is_not_found() {
    let (_mocks, _clock, controller) = setup();
    let err = controller.delete_worker("ghost").await.unwrap_err();
    assert!(matches!(err, CoordinatorError::WorkerNotFound { .. }));
}

#[tokio::test]
async fn test_delete_super_study_cascades() {
    let (mocks, _clock, controller) = setup();
    let (study_id, ids) = seed_study(&controller, 2).await;

    controller.delete_super_study(&study_id).await.unwrap();
    assert!(mocks.study(&study_id).is_none());
    assert!(ids.iter().all(|id| mocks.assignment(id).is_none()));

    let err = controller.delete_super_study(&study_id).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::SuperStudyNotFound { .. }));
}
