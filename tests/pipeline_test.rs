//! End-to-end tests for the fusion -> smoothing -> recording -> audit
//! pipeline, driven with explicit timestamps.

use chrono::{Duration, Utc};
use exam_sentinel::clips::ClipStore;
use exam_sentinel::core::{fuse, EvidenceRecorder, FusionThresholds, VerdictWindow};
use exam_sentinel::session::{AuditEntry, AuditLog, SessionClock};
use exam_sentinel::signal::{
    Frame, FrameSignals, GazeReading, HeadPose, LivenessLabel, LivenessReading, ObjectReport,
};
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("exam-sentinel-{name}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn quiet_signals() -> FrameSignals {
    FrameSignals {
        gaze: GazeReading::from_ratio(0.5),
        head: HeadPose::default(),
        objects: ObjectReport {
            person_count: 1,
            has_book: false,
            has_phone: false,
        },
        liveness: LivenessReading::new(LivenessLabel::Real, 0.95),
    }
}

/// Head turned away while the room is noisy: two co-occurring flags.
fn suspicious_signals() -> FrameSignals {
    let mut signals = quiet_signals();
    signals.head = HeadPose::new(25.0, 0.0);
    signals
}

/// Ten-second session at 1 Hz: quiet for t=0..2, a four-second episode of
/// head movement plus sound for t=3..6, quiet again for t=7..9. Expect one
/// persisted clip tagged with both flags and a ten-entry audit log.
#[test]
fn test_ten_second_session_scenario() {
    let dir = scratch_dir("scenario");
    let store = ClipStore::new(&dir).unwrap();
    let audit = AuditLog::new();

    let t0 = Utc::now();
    let clock = SessionClock::new(t0, 10);
    let mut window = VerdictWindow::new(4);
    let mut recorder = EvidenceRecorder::new(2, 20.0);
    let thresholds = FusionThresholds::default();

    for sec in 0..10i64 {
        let at = t0 + Duration::seconds(sec);
        let cheating_now = (3..=6).contains(&sec);
        let signals = if cheating_now {
            suspicious_signals()
        } else {
            quiet_signals()
        };

        let tick = fuse(at, &signals, cheating_now, &thresholds);
        assert_eq!(tick.cheating, cheating_now);

        let frame = Frame::new(vec![sec as u8; 16], 640, 480);
        recorder.observe(&tick, &frame, &store);
        window.insert(at, tick.cheating);

        audit.append(
            "student",
            AuditEntry {
                elapsed_secs: clock.elapsed_secs(at),
                cheating: window.majority_verdict(),
            },
        );
    }

    // Session end: recorder already closed the episode at t=7.
    assert!(recorder.finish(t0 + Duration::seconds(10), &store).is_none());

    // Exactly one clip, tagged with the episode duration and both flags.
    let clips = store.list().unwrap();
    assert_eq!(clips.len(), 1);
    assert!(clips[0].filename.contains("duration4s"));
    assert!(clips[0].filename.contains("head_movement_sound"));

    // Ten audit entries; with a 4s window the majority flips true from t=5
    // (3 of the trailing 5 verdicts true) through t=8.
    let entries = audit.entries_for("student");
    assert_eq!(entries.len(), 10);
    for (sec, entry) in entries.iter().enumerate() {
        let expected = (5..=8).contains(&sec);
        assert_eq!(
            entry.cheating, expected,
            "unexpected smoothed verdict at t={sec}"
        );
    }

    // Elapsed seconds are monotonically increasing.
    for pair in entries.windows(2) {
        assert!(pair[0].elapsed_secs < pair[1].elapsed_secs);
    }

    std::fs::remove_dir_all(&dir).ok();
}

/// An episode just under the minimum duration leaves no clip behind.
#[test]
fn test_sub_threshold_episode_leaves_no_clip() {
    let dir = scratch_dir("short");
    let store = ClipStore::new(&dir).unwrap();

    let t0 = Utc::now();
    let mut recorder = EvidenceRecorder::new(3, 20.0);
    let thresholds = FusionThresholds::default();

    // Two suspicious ticks one second apart, then quiet: 2s episode.
    for sec in 0..3i64 {
        let at = t0 + Duration::seconds(sec);
        let signals = if sec < 2 {
            suspicious_signals()
        } else {
            quiet_signals()
        };
        let tick = fuse(at, &signals, sec < 2, &thresholds);
        let frame = Frame::new(vec![0u8; 16], 640, 480);
        recorder.observe(&tick, &frame, &store);
    }

    assert!(store.list().unwrap().is_empty());
    std::fs::remove_dir_all(&dir).ok();
}

/// Forced session end mid-episode persists when the duration qualifies.
#[test]
fn test_forced_stop_mid_episode_persists() {
    let dir = scratch_dir("forced");
    let store = ClipStore::new(&dir).unwrap();

    let t0 = Utc::now();
    let mut recorder = EvidenceRecorder::new(2, 20.0);
    let thresholds = FusionThresholds::default();

    for sec in 0..3i64 {
        let at = t0 + Duration::seconds(sec);
        let tick = fuse(at, &suspicious_signals(), true, &thresholds);
        let frame = Frame::new(vec![0u8; 16], 640, 480);
        recorder.observe(&tick, &frame, &store);
    }
    assert!(recorder.is_recording());

    // Session torn down 3s into the episode.
    let event = recorder.finish(t0 + Duration::seconds(3), &store);
    assert!(event.is_some());
    assert_eq!(store.list().unwrap().len(), 1);

    std::fs::remove_dir_all(&dir).ok();
}
