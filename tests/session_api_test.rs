//! Session lifecycle: pause, resume across controllers, cancellation.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use trailhead::events::{NullSink, RecordingSink};
use trailhead::runner::{ScriptedExecutor, StepGraph, StepOutcome};
use trailhead::session::{
    FileStore, PersistenceStore, SessionConfig, SessionController, SessionStatus,
};
use trailhead::steps::{FailureKind, StepDefinition, StepStatus};
use trailhead::TrailheadError;

fn graph() -> Arc<StepGraph> {
    Arc::new(
        StepGraph::load(vec![
            StepDefinition::new("welcome", 1),
            StepDefinition::new("checks", 2).depends_on(["welcome"]),
            StepDefinition::new("install", 3).depends_on(["checks"]),
        ])
        .unwrap(),
    )
}

#[tokio::test]
async fn paused_session_resumes_in_a_new_controller() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(temp.path().join("sessions")));

    let first = SessionController::new(graph(), Arc::new(ScriptedExecutor::new()), Arc::new(NullSink))
        .with_store(store.clone());
    let id = first.start(SessionConfig::default()).unwrap();
    first.run_next().await.unwrap();
    assert_eq!(first.pause().unwrap(), SessionStatus::Paused);
    assert_eq!(first.run().await.unwrap(), SessionStatus::Paused);

    let (saved, nav) = store.load(&id).unwrap().unwrap();
    assert_eq!(saved.status, SessionStatus::Paused);
    assert_eq!(nav.current_step_id, "checks");

    let executor = Arc::new(ScriptedExecutor::new());
    let second = SessionController::new(graph(), executor.clone(), Arc::new(NullSink))
        .with_store(store.clone());
    assert_eq!(second.resume_from(store.as_ref(), &id).unwrap(), id);
    assert_eq!(second.run().await.unwrap(), SessionStatus::Completed);

    assert_eq!(executor.attempts_for("welcome"), 0);
    assert_eq!(executor.attempts_for("install"), 1);
    let report = second.report().unwrap();
    assert_eq!(report.success, 3);

    let (finished, _) = store.load(&id).unwrap().unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
}

#[tokio::test]
async fn resume_then_run_continues_in_place() {
    let c = SessionController::new(graph(), Arc::new(ScriptedExecutor::new()), Arc::new(NullSink));
    c.start(SessionConfig::default()).unwrap();
    c.pause().unwrap();
    assert!(c.run_next().await.unwrap().is_none());

    c.resume().unwrap();
    assert_eq!(c.run().await.unwrap(), SessionStatus::Completed);
}

#[tokio::test]
async fn finished_sessions_cannot_be_resumed() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(temp.path()));
    let c = SessionController::new(graph(), Arc::new(ScriptedExecutor::new()), Arc::new(NullSink))
        .with_store(store.clone());
    let id = c.start(SessionConfig::default()).unwrap();
    c.run().await.unwrap();

    let other =
        SessionController::new(graph(), Arc::new(ScriptedExecutor::new()), Arc::new(NullSink));
    assert!(matches!(
        other.resume_from(store.as_ref(), &id),
        Err(TrailheadError::InvalidLifecycle { .. })
    ));
}

#[tokio::test]
async fn cancel_interrupts_backoff() {
    let executor = ScriptedExecutor::new().repeat(
        "checks",
        StepOutcome::RetryableFailure("mirror timeout".into()),
        5,
    );
    let sink = Arc::new(RecordingSink::new());
    let c = Arc::new(SessionController::new(graph(), Arc::new(executor), sink.clone()));
    let config = SessionConfig {
        max_retries: 3,
        retry_delay_ms: 60_000,
        ..Default::default()
    };
    c.start(config).unwrap();

    let runner = {
        let c = c.clone();
        tokio::spawn(async move { c.run().await })
    };

    // Wait for the first failed attempt of `checks`, then cancel mid-backoff.
    tokio::time::timeout(Duration::from_secs(5), async {
        while !sink.progress().iter().any(|p| p.step_id == "checks") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(c.cancel().unwrap(), SessionStatus::Cancelled);

    let status = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("run should stop promptly after cancel")
        .unwrap()
        .unwrap();
    assert_eq!(status, SessionStatus::Cancelled);

    let checks = sink
        .completed()
        .into_iter()
        .find(|r| r.step_id == "checks")
        .unwrap();
    assert_eq!(checks.status, StepStatus::Failed);
    assert_eq!(checks.failure_kind(), Some(FailureKind::Cancelled));
    assert_eq!(checks.attempts, 1);
    assert!(!sink.completed_ids().contains(&"install".to_string()));
    assert_eq!(sink.reports().len(), 1);
    assert_eq!(c.report().unwrap().status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn cancel_before_run_finishes_immediately() {
    let sink = Arc::new(RecordingSink::new());
    let c = SessionController::new(graph(), Arc::new(ScriptedExecutor::new()), sink.clone());
    c.start(SessionConfig::default()).unwrap();

    c.cancel().unwrap();
    assert_eq!(c.cancel().unwrap(), SessionStatus::Cancelled);
    assert_eq!(c.run().await.unwrap(), SessionStatus::Cancelled);
    assert_eq!(sink.reports().len(), 1);
    assert!(matches!(
        c.request_next(),
        Err(TrailheadError::Transition(_))
    ));
}
