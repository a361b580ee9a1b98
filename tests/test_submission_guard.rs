//! Integration tests for the double-submission guard.

mod common;

use std::time::Duration;

use estatedesk::wizard::{Fingerprint, SubmissionGuard};
use tokio::time::{Instant, advance};

const WINDOW: Duration = Duration::from_secs(5);

#[tokio::test(start_paused = true)]
async fn test_immediate_second_acquire_is_rejected() {
    let guard = SubmissionGuard::new(WINDOW);

    let first = guard.try_acquire(Fingerprint::now("Palm Heights"));
    let second = guard.try_acquire(Fingerprint::now("Palm Heights"));
    assert!(first.is_some());
    assert!(second.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_rejects_any_name() {
    let guard = SubmissionGuard::new(WINDOW);

    let permit = guard.try_acquire(Fingerprint::now("Tower One"));
    assert!(permit.is_some());
    assert!(guard.is_in_flight());
    assert!(guard.try_acquire(Fingerprint::now("Tower Two")).is_none());

    drop(permit);
    assert!(!guard.is_in_flight());
    assert!(guard.try_acquire(Fingerprint::now("Tower Two")).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_rejected_after_completion() {
    let guard = SubmissionGuard::new(WINDOW);

    drop(guard.try_acquire(Fingerprint::now("Palm Heights")));
    assert!(!guard.is_in_flight());

    advance(Duration::from_secs(2)).await;
    // Name matching ignores case and surrounding spaces
    assert!(guard.try_acquire(Fingerprint::now("  palm heights ")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_acquire_succeeds_after_window() {
    let guard = SubmissionGuard::new(WINDOW);

    drop(guard.try_acquire(Fingerprint::now("Palm Heights")));
    advance(Duration::from_millis(5_001)).await;

    let permit = guard.try_acquire(Fingerprint::now("Palm Heights"));
    assert!(permit.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_state() {
    let guard = SubmissionGuard::new(WINDOW);
    let other = guard.clone();

    let _permit = guard.try_acquire(Fingerprint::new("A", Instant::now()));
    assert!(other.is_in_flight());
    assert!(other.try_acquire(Fingerprint::now("B")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_wizard_retries_after_window() -> anyhow::Result<()> {
    use common::*;

    let backend = FakeBackend::new();
    let mut wizard = new_wizard(&backend);
    let patch = ProjectPatch {
        name: Some("Palm Heights".to_string()),
        ..Default::default()
    };

    wizard.open(None).await?;
    wizard.stage_project(patch.clone())?;
    assert!(matches!(wizard.commit().await?, CommitOutcome::Created(_)));

    wizard.open(None).await?;
    wizard.stage_project(patch.clone())?;
    assert_eq!(wizard.commit().await?, CommitOutcome::Skipped);
    // A skipped commit leaves the session open
    assert!(wizard.is_open());

    advance(Duration::from_secs(6)).await;
    assert!(matches!(wizard.commit().await?, CommitOutcome::Created(_)));
    assert_eq!(backend.count(|c| matches!(c, Call::CreateProject(_))), 2);

    Ok(())
}
