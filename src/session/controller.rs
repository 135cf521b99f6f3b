//! Session lifecycle and the frame-processing loop.
//!
//! `SessionController` owns the session state and the shared sound flag; it
//! launches the audio watch on `start` and hands out a [`FrameStream`] that
//! drives fusion, smoothing, recording and audit appends one tick at a time.
//! Only the sound flag crosses thread boundaries; everything tick-derived is
//! owned by the stream.

use crate::clips::ClipStore;
use crate::config::Config;
use crate::core::fusion::{fuse, FusionThresholds, Tick};
use crate::core::recorder::{ClipEvent, ClipWriter, EvidenceRecorder};
use crate::core::smoothing::VerdictWindow;
use crate::session::audit::{AuditEntry, SharedAuditLog};
use crate::session::clock::SessionClock;
use crate::signal::audio::AUDIO_POLL_INTERVAL;
use crate::signal::{AnalyzerStack, AudioDevice, AudioWatch, CaptureDevice, FrameSource, SoundLevel};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Session lifecycle errors.
#[derive(Debug)]
pub enum SessionError {
    /// `start` called while a session is running; no state change
    AlreadyActive,
    /// An operation that needs an active session found none
    NotActive,
    /// The audio device could not be opened
    AudioUnavailable(String),
    /// The video capture source could not be opened
    CaptureUnavailable(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::AlreadyActive => write!(f, "a session is already active"),
            SessionError::NotActive => write!(f, "no active session"),
            SessionError::AudioUnavailable(e) => write!(f, "audio unavailable: {e}"),
            SessionError::CaptureUnavailable(e) => write!(f, "capture unavailable: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub active: bool,
    /// Identifier of the running session, `None` when inactive
    pub session_id: Option<Uuid>,
    pub time_remaining_secs: u64,
}

struct SessionState {
    active: bool,
    session_id: Option<Uuid>,
    username: Option<String>,
    clock: Option<SessionClock>,
}

/// Owns the lifecycle of one monitored session at a time.
pub struct SessionController {
    config: Mutex<Config>,
    state: Mutex<SessionState>,
    sound: Arc<SoundLevel>,
    audio_watch: Mutex<Option<AudioWatch>>,
    audio: Box<dyn AudioDevice>,
    capture: Box<dyn CaptureDevice>,
    analyzers: Mutex<AnalyzerStack>,
    clips: Arc<ClipStore>,
    audit: SharedAuditLog,
}

impl SessionController {
    pub fn new(
        config: Config,
        capture: Box<dyn CaptureDevice>,
        analyzers: AnalyzerStack,
        audio: Box<dyn AudioDevice>,
        clips: Arc<ClipStore>,
        audit: SharedAuditLog,
    ) -> Self {
        Self {
            config: Mutex::new(config),
            state: Mutex::new(SessionState {
                active: false,
                session_id: None,
                username: None,
                clock: None,
            }),
            sound: Arc::new(SoundLevel::new()),
            audio_watch: Mutex::new(None),
            audio,
            capture,
            analyzers: Mutex::new(analyzers),
            clips,
            audit,
        }
    }

    /// Start a session for `username`.
    ///
    /// Fails with `AlreadyActive` if one is running, and propagates an audio
    /// device open failure without changing state.
    pub fn start(&self, username: &str, duration_secs: Option<u64>) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.active {
            return Err(SessionError::AlreadyActive);
        }

        let (total_secs, sound_threshold) = {
            let config = self.config.lock().unwrap();
            (
                duration_secs.unwrap_or(config.total_duration.as_secs()),
                config.sound_threshold,
            )
        };

        let monitor = self
            .audio
            .open()
            .map_err(|e| SessionError::AudioUnavailable(e.to_string()))?;

        let watch = AudioWatch::spawn(
            monitor,
            self.sound.clone(),
            sound_threshold,
            AUDIO_POLL_INTERVAL,
        );
        *self.audio_watch.lock().unwrap() = Some(watch);

        state.active = true;
        state.session_id = Some(Uuid::new_v4());
        state.username = Some(username.to_string());
        state.clock = Some(SessionClock::new(Utc::now(), total_secs));
        Ok(())
    }

    /// Stop the active session. A second stop returns `NotActive`.
    pub fn stop(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if !state.active {
            return Err(SessionError::NotActive);
        }
        self.stop_locked(&mut state);
        Ok(())
    }

    fn stop_locked(&self, state: &mut SessionState) {
        state.active = false;
        state.session_id = None;

        if let Some(mut watch) = self.audio_watch.lock().unwrap().take() {
            watch.stop();
        }

        if let Err(e) = self.audit.save() {
            eprintln!("Warning: Could not save audit log: {e}");
        }
    }

    /// Current status. Reaching the deadline while active stops the session
    /// here (lazy auto-termination); the call itself never fails.
    pub fn status(&self) -> SessionStatus {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        if state.active {
            let clock = state.clock.expect("active session has a clock");
            if clock.expired(now) {
                self.stop_locked(&mut state);
                return SessionStatus {
                    active: false,
                    session_id: None,
                    time_remaining_secs: 0,
                };
            }
            return SessionStatus {
                active: true,
                session_id: state.session_id,
                time_remaining_secs: clock.remaining_secs(now),
            };
        }

        SessionStatus {
            active: false,
            session_id: None,
            time_remaining_secs: self.config.lock().unwrap().total_duration.as_secs(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    fn current_session_id(&self) -> Option<Uuid> {
        self.state.lock().unwrap().session_id
    }

    /// Open the capture device and return the frame stream for the active
    /// session. The stream is lazy, infinite while active, and not
    /// restartable; a new call re-opens the device.
    pub fn stream_frames(self: &Arc<Self>, username: &str) -> Result<FrameStream, SessionError> {
        let (session_id, clock) = {
            let state = self.state.lock().unwrap();
            if !state.active {
                return Err(SessionError::NotActive);
            }
            (
                state.session_id.expect("active session has an id"),
                state.clock.expect("active session has a clock"),
            )
        };

        let source = self
            .capture
            .open()
            .map_err(|e| SessionError::CaptureUnavailable(e.to_string()))?;

        let (window_secs, min_secs, fps, thresholds) = {
            let config = self.config.lock().unwrap();
            (
                config.smoothing_window.as_secs(),
                config.minimum_cheating_duration.as_secs(),
                config.output_fps,
                FusionThresholds {
                    head_angle_limit_deg: config.head_angle_limit_deg,
                    liveness_confidence_floor: config.liveness_confidence_floor,
                },
            )
        };

        Ok(FrameStream {
            controller: self.clone(),
            session_id,
            source,
            window: VerdictWindow::new(window_secs),
            recorder: EvidenceRecorder::new(min_secs, fps),
            thresholds,
            clock,
            username: username.to_string(),
            closed: false,
        })
    }

    /// Current settings.
    pub fn settings(&self) -> Config {
        self.config.lock().unwrap().clone()
    }

    /// Update the runtime-adjustable settings. Changes apply to the next
    /// session / stream; the active clock is not rewound.
    pub fn update_settings(
        &self,
        total_duration_secs: Option<u64>,
        minimum_cheating_duration_secs: Option<u64>,
    ) -> Config {
        let mut config = self.config.lock().unwrap();
        if let Some(secs) = total_duration_secs {
            config.total_duration = std::time::Duration::from_secs(secs);
        }
        if let Some(secs) = minimum_cheating_duration_secs {
            config.minimum_cheating_duration = std::time::Duration::from_secs(secs);
        }
        config.clone()
    }

    pub fn audit(&self) -> &SharedAuditLog {
        &self.audit
    }

    pub fn clips(&self) -> &Arc<ClipStore> {
        &self.clips
    }

    pub fn sound(&self) -> &Arc<SoundLevel> {
        &self.sound
    }
}

/// One streamed frame plus what the tick loop derived from it.
///
/// The encoded bytes are yielded as-is; wrapping them for transport
/// (multipart boundaries etc.) is the service layer's job.
#[derive(Debug)]
pub struct FrameUpdate {
    pub frame: Vec<u8>,
    /// `None` when the tick was skipped (no face, or a detector failed)
    pub tick: Option<Tick>,
    pub smoothed_verdict: bool,
}

/// The frame-processing loop, driven by pulling on the iterator.
///
/// Each `next()` fully processes one tick (fusion, smoothing, recording,
/// audit append) before yielding. The stream ends when the session stops,
/// the deadline passes, or the capture source is exhausted; the recorder is
/// flushed on the way out.
pub struct FrameStream {
    controller: Arc<SessionController>,
    /// Identity of the session this stream was opened for. The stream is
    /// dead once the controller no longer runs this exact session.
    session_id: Uuid,
    source: Box<dyn FrameSource>,
    window: VerdictWindow,
    recorder: EvidenceRecorder,
    thresholds: FusionThresholds,
    clock: SessionClock,
    username: String,
    closed: bool,
}

impl FrameStream {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Forced stop: flush-or-discard by the same duration rule.
        let writer: &dyn ClipWriter = self.controller.clips.as_ref();
        if let Some(event) = self.recorder.finish(Utc::now(), writer) {
            log_clip_event(&event);
        }
    }
}

impl Iterator for FrameStream {
    type Item = FrameUpdate;

    fn next(&mut self) -> Option<FrameUpdate> {
        if self.closed {
            return None;
        }

        // Cooperative stop, observed at the top of each iteration. Matching
        // on the session id rather than a bare active flag keeps a stream
        // orphaned by stop() dead even after a new session starts.
        if self.controller.current_session_id() != Some(self.session_id) {
            self.close();
            return None;
        }

        // No frames are processed once the deadline passes.
        if self.clock.expired(Utc::now()) {
            let _ = self.controller.stop();
            self.close();
            return None;
        }

        // A failed read is end-of-stream, not an error to recover from.
        let frame = match self.source.next_frame() {
            Some(frame) => frame,
            None => {
                self.close();
                return None;
            }
        };

        let now = Utc::now();
        let analyzed = {
            let mut analyzers = self.controller.analyzers.lock().unwrap();
            analyzers.analyze(&frame)
        };

        let signals = match analyzed {
            Ok(Some(signals)) => signals,
            Ok(None) => {
                // No face in frame: skip the tick, still stream the frame.
                return Some(FrameUpdate {
                    frame: frame.data,
                    tick: None,
                    smoothed_verdict: self.window.majority_verdict(),
                });
            }
            Err(e) => {
                // Skip-on-error: no tick, no audit entry, session continues.
                eprintln!("Skipping tick, analysis failed: {e}");
                return Some(FrameUpdate {
                    frame: frame.data,
                    tick: None,
                    smoothed_verdict: self.window.majority_verdict(),
                });
            }
        };

        let tick = fuse(
            now,
            &signals,
            self.controller.sound.detected(),
            &self.thresholds,
        );

        let writer: &dyn ClipWriter = self.controller.clips.as_ref();
        if let Some(event) = self.recorder.observe(&tick, &frame, writer) {
            log_clip_event(&event);
        }

        self.window.insert(now, tick.cheating);
        let smoothed = self.window.majority_verdict();

        self.controller.audit.append(
            &self.username,
            AuditEntry {
                elapsed_secs: self.clock.elapsed_secs(now),
                cheating: smoothed,
            },
        );

        Some(FrameUpdate {
            frame: frame.data,
            tick: Some(tick),
            smoothed_verdict: smoothed,
        })
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        // A dropped stream (client disconnect) still flushes evidence.
        self.close();
    }
}

fn log_clip_event(event: &ClipEvent) {
    match event {
        ClipEvent::Persisted { path, .. } => {
            println!("Saved cheating clip: {}", path.display());
        }
        ClipEvent::Discarded { duration_secs } => {
            println!("Discarded short cheating episode ({duration_secs:.1}s)");
        }
        ClipEvent::PersistFailed { tag, error } => {
            eprintln!("Failed to persist clip {}: {error}", tag.file_stem());
        }
    }
}
