//! Integration tests for the session controller lifecycle.

use exam_sentinel::clips::ClipStore;
use exam_sentinel::config::Config;
use exam_sentinel::session::{AuditLog, SessionController, SessionError};
use exam_sentinel::signal::{SyntheticAudio, SyntheticCapture, SyntheticScript};
use std::path::PathBuf;
use std::sync::Arc;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("exam-sentinel-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_config(dir: &PathBuf) -> Config {
    let mut config = Config::default();
    config.recordings_dir = dir.join("recordings");
    config.data_path = dir.clone();
    config
}

fn build_controller(dir: &PathBuf, frame_limit: usize) -> Arc<SessionController> {
    let config = test_config(dir);
    let clips = Arc::new(ClipStore::new(&config.recordings_dir).unwrap());
    Arc::new(SessionController::new(
        config,
        Box::new(SyntheticCapture::new(64, 48, 200.0).with_frame_limit(frame_limit)),
        SyntheticScript::quiet().stack(),
        Box::new(SyntheticAudio::silent()),
        clips,
        Arc::new(AuditLog::new()),
    ))
}

#[test]
fn test_start_is_exclusive() {
    let dir = scratch_dir("exclusive");
    let controller = build_controller(&dir, 4);

    controller.start("alice", Some(60)).unwrap();
    assert!(matches!(
        controller.start("bob", Some(60)),
        Err(SessionError::AlreadyActive)
    ));

    controller.stop().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_double_stop_is_safe() {
    let dir = scratch_dir("double-stop");
    let controller = build_controller(&dir, 4);

    controller.start("alice", Some(60)).unwrap();
    controller.stop().unwrap();
    assert!(matches!(controller.stop(), Err(SessionError::NotActive)));

    // Status after double stop is well-defined, not a crash.
    let status = controller.status();
    assert!(!status.active);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_status_reports_remaining_and_auto_terminates() {
    let dir = scratch_dir("status");
    let controller = build_controller(&dir, 4);

    // Inactive: remaining falls back to the configured total.
    let status = controller.status();
    assert!(!status.active);
    assert!(status.session_id.is_none());
    assert_eq!(status.time_remaining_secs, 100);

    controller.start("alice", Some(3600)).unwrap();
    let status = controller.status();
    assert!(status.active);
    assert!(status.session_id.is_some());
    assert!(status.time_remaining_secs > 3590);
    controller.stop().unwrap();

    // A zero-duration session is expired on the first status call, which
    // performs the stop itself.
    controller.start("alice", Some(0)).unwrap();
    let status = controller.status();
    assert!(!status.active);
    assert_eq!(status.time_remaining_secs, 0);

    // And the next call is a plain inactive report.
    let status = controller.status();
    assert!(!status.active);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_stream_requires_active_session() {
    let dir = scratch_dir("stream-gate");
    let controller = build_controller(&dir, 4);

    assert!(matches!(
        controller.stream_frames("alice"),
        Err(SessionError::NotActive)
    ));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_stream_processes_ticks_and_appends_audit() {
    let dir = scratch_dir("stream");
    let controller = build_controller(&dir, 6);

    controller.start("alice", Some(3600)).unwrap();
    let updates: Vec<_> = controller.stream_frames("alice").unwrap().collect();

    // Source exhausted after six frames; quiet script means no cheating.
    assert_eq!(updates.len(), 6);
    for update in &updates {
        let tick = update.tick.as_ref().expect("face always visible");
        assert!(tick.flags.is_empty());
        assert!(!tick.cheating);
        assert!(!update.smoothed_verdict);
    }

    let entries = controller.audit().entries_for("alice");
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| !e.cheating));

    controller.stop().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_stop_ends_stream() {
    let dir = scratch_dir("stop-ends");
    let controller = build_controller(&dir, 100_000);

    controller.start("alice", Some(3600)).unwrap();
    let mut stream = controller.stream_frames("alice").unwrap();

    assert!(stream.next().is_some());
    controller.stop().unwrap();

    // Cooperative cancellation is observed at the top of the next iteration.
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_unpolled_stream_stays_dead_across_restart() {
    let dir = scratch_dir("restart");
    let controller = build_controller(&dir, 100_000);

    // Open a stream for the first session but never poll it past the stop.
    controller.start("alice", Some(3600)).unwrap();
    let mut stale = controller.stream_frames("alice").unwrap();
    assert!(stale.next().is_some());
    let alice_entries = controller.audit().entries_for("alice").len();

    controller.stop().unwrap();
    controller.start("bob", Some(3600)).unwrap();

    // The old stream belongs to the stopped session and must not revive
    // under the new one.
    assert!(stale.next().is_none());
    assert_eq!(controller.audit().entries_for("alice").len(), alice_entries);
    assert!(controller.is_active());

    // The new session streams normally.
    let mut fresh = controller.stream_frames("bob").unwrap();
    assert!(fresh.next().is_some());

    controller.stop().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_stale_stream_with_expired_clock_leaves_new_session_running() {
    let dir = scratch_dir("restart-expired");
    let controller = build_controller(&dir, 100_000);

    // First session expires immediately; its stream is created but the
    // deadline is never observed before the restart.
    controller.start("alice", Some(0)).unwrap();
    let mut stale = controller.stream_frames("alice").unwrap();

    controller.stop().unwrap();
    controller.start("bob", Some(3600)).unwrap();

    // Polling the stale stream must not tear down the new session through
    // its own expired deadline.
    assert!(stale.next().is_none());
    assert!(controller.is_active());
    let status = controller.status();
    assert!(status.active);

    controller.stop().unwrap();
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_settings_update_applies_to_next_session() {
    let dir = scratch_dir("settings");
    let controller = build_controller(&dir, 4);

    let updated = controller.update_settings(Some(42), Some(5));
    assert_eq!(updated.total_duration.as_secs(), 42);
    assert_eq!(updated.minimum_cheating_duration.as_secs(), 5);

    // New default duration shows up in the inactive status report.
    let status = controller.status();
    assert_eq!(status.time_remaining_secs, 42);

    std::fs::remove_dir_all(&dir).ok();
}
