//! Synthetic capture and detector implementations.
//!
//! These exist so the binary can run end to end on any machine without a
//! camera, microphone, or model weights: the capture device emits placeholder
//! frames on a paced producer thread and the analyzers replay a script of
//! signals. Real deployments plug their own implementations into the same
//! traits.

use crate::signal::{
    AnalyzerStack, AudioDevice, AudioLevelMonitor, CaptureDevice, Frame, FrameSignals, FrameSource,
    GazeEstimator, GazeReading, HeadPose, HeadPoseEstimator, LivenessClassifier, LivenessLabel,
    LivenessReading, ObjectPresenceDetector, ObjectReport, SignalError,
};
use crossbeam_channel::{bounded, Receiver};
use std::thread;
use std::time::Duration;

/// Synthetic video capture producing placeholder frames at a fixed rate.
pub struct SyntheticCapture {
    width: u32,
    height: u32,
    fps: f64,
    /// Stop after this many frames; `None` runs until the stream is dropped.
    frame_limit: Option<usize>,
}

impl SyntheticCapture {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            frame_limit: None,
        }
    }

    /// Limit the stream to a fixed number of frames (source exhaustion).
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit);
        self
    }
}

impl CaptureDevice for SyntheticCapture {
    fn open(&self) -> Result<Box<dyn FrameSource>, SignalError> {
        let (sender, receiver) = bounded(8);
        let width = self.width;
        let height = self.height;
        let interval = Duration::from_secs_f64(1.0 / self.fps.max(1.0));
        let limit = self.frame_limit;

        thread::spawn(move || {
            let mut produced = 0usize;
            loop {
                if let Some(limit) = limit {
                    if produced >= limit {
                        break;
                    }
                }
                // Placeholder payload; a real device delivers encoded bytes.
                let frame = Frame::new(vec![0u8; 64], width, height);
                if sender.send(frame).is_err() {
                    // Stream dropped, stop producing.
                    break;
                }
                produced += 1;
                thread::sleep(interval);
            }
        });

        Ok(Box::new(ChannelSource { receiver }))
    }
}

/// Frame source backed by the producer thread's channel.
struct ChannelSource {
    receiver: Receiver<Frame>,
}

impl FrameSource for ChannelSource {
    fn next_frame(&mut self) -> Option<Frame> {
        self.receiver.recv().ok()
    }
}

/// Synthetic audio device reporting a constant volume.
pub struct SyntheticAudio {
    volume: f64,
}

impl SyntheticAudio {
    pub fn silent() -> Self {
        Self { volume: 0.0 }
    }

    pub fn with_volume(volume: f64) -> Self {
        Self { volume }
    }
}

impl AudioDevice for SyntheticAudio {
    fn open(&self) -> Result<Box<dyn AudioLevelMonitor>, SignalError> {
        Ok(Box::new(ConstantMonitor {
            volume: self.volume,
        }))
    }
}

struct ConstantMonitor {
    volume: f64,
}

impl AudioLevelMonitor for ConstantMonitor {
    fn sample(&mut self) -> Result<f64, SignalError> {
        Ok(self.volume)
    }
}

/// A replayable script of per-frame signals.
///
/// Each analyzer in the stack is called exactly once per analyzed frame, so
/// every adapter keeps its own cursor over a clone of the sequence and they
/// stay aligned. The last entry repeats once the script runs out.
#[derive(Clone)]
pub struct SyntheticScript {
    entries: Vec<FrameSignals>,
}

impl SyntheticScript {
    pub fn new(entries: Vec<FrameSignals>) -> Self {
        assert!(!entries.is_empty(), "script needs at least one entry");
        Self { entries }
    }

    /// A script of one candidate sitting still, looking at the screen.
    pub fn quiet() -> Self {
        Self::new(vec![FrameSignals {
            gaze: GazeReading::from_ratio(0.5),
            head: HeadPose::default(),
            objects: ObjectReport {
                person_count: 1,
                has_book: false,
                has_phone: false,
            },
            liveness: LivenessReading::new(LivenessLabel::Real, 0.95),
        }])
    }

    /// Build an analyzer stack replaying this script.
    pub fn stack(&self) -> AnalyzerStack {
        AnalyzerStack::new(
            Box::new(ScriptObjects::new(self.clone())),
            Box::new(ScriptGaze::new(self.clone())),
            Box::new(ScriptHead::new(self.clone())),
            Box::new(ScriptLiveness::new(self.clone())),
        )
    }

    fn at(&self, index: usize) -> &FrameSignals {
        let clamped = index.min(self.entries.len() - 1);
        &self.entries[clamped]
    }
}

macro_rules! script_adapter {
    ($name:ident) => {
        struct $name {
            script: SyntheticScript,
            cursor: usize,
        }

        impl $name {
            fn new(script: SyntheticScript) -> Self {
                Self { script, cursor: 0 }
            }

            fn advance(&mut self) -> &FrameSignals {
                let entry = self.script.at(self.cursor);
                self.cursor += 1;
                entry
            }
        }
    };
}

script_adapter!(ScriptObjects);
script_adapter!(ScriptGaze);
script_adapter!(ScriptHead);
script_adapter!(ScriptLiveness);

impl ObjectPresenceDetector for ScriptObjects {
    fn detect(&mut self, _frame: &Frame) -> Result<ObjectReport, SignalError> {
        Ok(self.advance().objects)
    }
}

impl GazeEstimator for ScriptGaze {
    fn estimate(&mut self, _frame: &Frame) -> Result<Option<GazeReading>, SignalError> {
        Ok(Some(self.advance().gaze))
    }
}

impl HeadPoseEstimator for ScriptHead {
    fn estimate(&mut self, _frame: &Frame) -> Result<Option<HeadPose>, SignalError> {
        Ok(Some(self.advance().head))
    }
}

impl LivenessClassifier for ScriptLiveness {
    fn classify(&mut self, _frame: &Frame) -> Result<LivenessReading, SignalError> {
        Ok(self.advance().liveness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_capture_honors_frame_limit() {
        let capture = SyntheticCapture::new(64, 48, 1000.0).with_frame_limit(3);
        let mut source = capture.open().expect("open synthetic capture");

        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_some());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_script_repeats_last_entry() {
        let script = SyntheticScript::quiet();
        let mut stack = script.stack();
        let frame = Frame::new(vec![0u8; 16], 64, 48);

        for _ in 0..5 {
            let signals = stack
                .analyze(&frame)
                .expect("analyze")
                .expect("face visible");
            assert!(signals.gaze.direction.is_centered());
            assert_eq!(signals.objects.person_count, 1);
        }
    }
}
