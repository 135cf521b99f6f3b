//! Evidence recording state machine.
//!
//! The recorder reacts to the instantaneous verdict: it starts buffering
//! frames when the verdict turns true, accumulates every flag seen during
//! the episode, and on verdict-false either discards the buffer (episode too
//! short) or hands it to a [`ClipWriter`] for persistence. At most one
//! recording exists at a time.

use crate::clips::ClipError;
use crate::core::fusion::{join_flags, FlagSet, Tick};
use crate::signal::Frame;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

/// Structured metadata carried in a persisted clip's name: creation
/// timestamp, integer-second duration, and the sorted flag set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipTag {
    pub created_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub flags: FlagSet,
}

impl ClipTag {
    /// File stem encoding the tag, e.g.
    /// `cheating_20260830_141503_duration4s_head_movement_sound`.
    pub fn file_stem(&self) -> String {
        format!(
            "cheating_{}_duration{}s_{}",
            self.created_at.format("%Y%m%d_%H%M%S"),
            self.duration_secs,
            join_flags(&self.flags)
        )
    }
}

/// Durable storage for evidence clips.
///
/// A persist failure is fatal to that attempt only; the caller logs it and
/// the session continues.
pub trait ClipWriter: Send + Sync {
    fn persist(
        &self,
        frames: &[Frame],
        frame_size: (u32, u32),
        fps: f64,
        tag: &ClipTag,
    ) -> Result<PathBuf, ClipError>;
}

/// What happened when a recording episode ended.
#[derive(Debug)]
pub enum ClipEvent {
    /// Episode met the minimum duration and was written out
    Persisted { path: PathBuf, tag: ClipTag },
    /// Episode was shorter than the minimum duration; buffer dropped
    Discarded { duration_secs: f64 },
    /// Episode met the duration but the write failed; buffer dropped
    PersistFailed { tag: ClipTag, error: ClipError },
}

enum State {
    Idle,
    Recording {
        started_at: DateTime<Utc>,
        frames: Vec<Frame>,
        flags: FlagSet,
        frame_size: (u32, u32),
    },
}

/// The Idle/Recording state machine driven by ticks.
pub struct EvidenceRecorder {
    minimum_duration: Duration,
    output_fps: f64,
    state: State,
}

impl EvidenceRecorder {
    pub fn new(minimum_duration_secs: u64, output_fps: f64) -> Self {
        Self {
            minimum_duration: Duration::seconds(minimum_duration_secs as i64),
            output_fps,
            state: State::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording { .. })
    }

    /// Feed one tick and its frame through the state machine.
    ///
    /// Returns an event only when a recording episode ends on this tick.
    pub fn observe(
        &mut self,
        tick: &Tick,
        frame: &Frame,
        writer: &dyn ClipWriter,
    ) -> Option<ClipEvent> {
        if tick.cheating {
            match self.state {
                State::Idle => {
                    self.state = State::Recording {
                        started_at: tick.at,
                        frames: vec![frame.clone()],
                        flags: tick.flags.clone(),
                        frame_size: frame.size(),
                    };
                }
                State::Recording {
                    ref mut frames,
                    ref mut flags,
                    ..
                } => {
                    frames.push(frame.clone());
                    flags.extend(tick.flags.iter().copied());
                }
            }
            None
        } else {
            self.finish(tick.at, writer)
        }
    }

    /// Close out a recording in progress, persisting or discarding by the
    /// duration rule. Used both for the verdict-false transition and for a
    /// forced stop at session end. A no-op when idle.
    pub fn finish(&mut self, now: DateTime<Utc>, writer: &dyn ClipWriter) -> Option<ClipEvent> {
        let state = std::mem::replace(&mut self.state, State::Idle);
        let (started_at, frames, flags, frame_size) = match state {
            State::Idle => return None,
            State::Recording {
                started_at,
                frames,
                flags,
                frame_size,
            } => (started_at, frames, flags, frame_size),
        };

        let duration = now - started_at;
        if duration < self.minimum_duration {
            return Some(ClipEvent::Discarded {
                duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            });
        }

        let tag = ClipTag {
            created_at: started_at,
            duration_secs: duration.num_seconds(),
            flags,
        };
        match writer.persist(&frames, frame_size, self.output_fps, &tag) {
            Ok(path) => Some(ClipEvent::Persisted { path, tag }),
            Err(error) => Some(ClipEvent::PersistFailed { tag, error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fusion::Flag;
    use std::sync::Mutex;

    /// Writer that remembers what it was asked to persist.
    struct RecordingWriter {
        persisted: Mutex<Vec<(usize, ClipTag)>>,
        fail: bool,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self {
                persisted: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                persisted: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    impl ClipWriter for RecordingWriter {
        fn persist(
            &self,
            frames: &[Frame],
            _frame_size: (u32, u32),
            _fps: f64,
            tag: &ClipTag,
        ) -> Result<PathBuf, ClipError> {
            if self.fail {
                return Err(ClipError::Io("disk full".into()));
            }
            self.persisted
                .lock()
                .unwrap()
                .push((frames.len(), tag.clone()));
            Ok(PathBuf::from(format!("{}.mjpeg", tag.file_stem())))
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 32], 640, 480)
    }

    fn tick(at: DateTime<Utc>, flags: &[Flag]) -> Tick {
        let flags: FlagSet = flags.iter().copied().collect();
        let cheating = flags.len() >= 2;
        Tick { at, flags, cheating }
    }

    #[test]
    fn test_short_episode_is_discarded() {
        let writer = RecordingWriter::new();
        let mut recorder = EvidenceRecorder::new(3, 20.0);
        let t0 = Utc::now();

        recorder.observe(&tick(t0, &[Flag::Sound, Flag::Phone]), &frame(), &writer);
        assert!(recorder.is_recording());

        // Verdict drops 2s in, under the 3s minimum.
        let event = recorder.observe(&tick(t0 + Duration::seconds(2), &[]), &frame(), &writer);
        assert!(matches!(event, Some(ClipEvent::Discarded { .. })));
        assert!(!recorder.is_recording());
        assert!(writer.persisted.lock().unwrap().is_empty());
    }

    #[test]
    fn test_long_episode_persists_with_union_of_flags() {
        let writer = RecordingWriter::new();
        let mut recorder = EvidenceRecorder::new(3, 20.0);
        let t0 = Utc::now();

        recorder.observe(&tick(t0, &[Flag::Sound, Flag::Phone]), &frame(), &writer);
        recorder.observe(
            &tick(t0 + Duration::seconds(2), &[Flag::Sound, Flag::Book]),
            &frame(),
            &writer,
        );
        let event = recorder.observe(&tick(t0 + Duration::seconds(4), &[]), &frame(), &writer);

        match event {
            Some(ClipEvent::Persisted { tag, .. }) => {
                assert_eq!(tag.duration_secs, 4);
                let expected: FlagSet = [Flag::Sound, Flag::Phone, Flag::Book]
                    .into_iter()
                    .collect();
                assert_eq!(tag.flags, expected);
            }
            other => panic!("expected Persisted, got {other:?}"),
        }

        let persisted = writer.persisted.lock().unwrap();
        assert_eq!(persisted.len(), 1);
        // Two frames buffered during the episode.
        assert_eq!(persisted[0].0, 2);
    }

    #[test]
    fn test_forced_stop_uses_same_duration_rule() {
        let writer = RecordingWriter::new();
        let mut recorder = EvidenceRecorder::new(3, 20.0);
        let t0 = Utc::now();

        recorder.observe(&tick(t0, &[Flag::Sound, Flag::Phone]), &frame(), &writer);

        // Session ends mid-recording, 5s into the episode.
        let event = recorder.finish(t0 + Duration::seconds(5), &writer);
        assert!(matches!(event, Some(ClipEvent::Persisted { .. })));

        // Finishing again is a no-op.
        assert!(recorder.finish(t0 + Duration::seconds(6), &writer).is_none());
    }

    #[test]
    fn test_persist_failure_drops_buffer_and_reports() {
        let writer = RecordingWriter::failing();
        let mut recorder = EvidenceRecorder::new(1, 20.0);
        let t0 = Utc::now();

        recorder.observe(&tick(t0, &[Flag::Sound, Flag::Phone]), &frame(), &writer);
        let event = recorder.observe(&tick(t0 + Duration::seconds(2), &[]), &frame(), &writer);

        assert!(matches!(event, Some(ClipEvent::PersistFailed { .. })));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_clip_tag_file_stem() {
        use chrono::TimeZone;
        let tag = ClipTag {
            created_at: Utc.with_ymd_and_hms(2026, 8, 30, 14, 15, 3).unwrap(),
            duration_secs: 4,
            flags: [Flag::Sound, Flag::HeadMovement].into_iter().collect(),
        };
        assert_eq!(
            tag.file_stem(),
            "cheating_20260830_141503_duration4s_head_movement_sound"
        );
    }
}
