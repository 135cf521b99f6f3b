//! Signal collaborator boundary for the exam sentinel.
//!
//! The fusion core consumes five kinds of per-tick detection results. The
//! detectors themselves (object detection, gaze, head pose, liveness, audio
//! level) live behind the traits in this module so the core stays model-free.

pub mod audio;
pub mod synthetic;
pub mod types;

// Re-export commonly used types
pub use types::{
    Frame, GazeDirection, GazeReading, HeadPose, LivenessLabel, LivenessReading, ObjectReport,
    SignalError,
};

pub use audio::{AudioWatch, SoundLevel};
pub use synthetic::{SyntheticAudio, SyntheticCapture, SyntheticScript};

/// Object detection over a frame: person count plus book/phone presence.
pub trait ObjectPresenceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<ObjectReport, SignalError>;
}

/// Gaze estimation. Returns `None` when no face is visible in the frame.
pub trait GazeEstimator: Send {
    fn estimate(&mut self, frame: &Frame) -> Result<Option<GazeReading>, SignalError>;
}

/// Head pose estimation. Returns `None` when no face is visible.
pub trait HeadPoseEstimator: Send {
    fn estimate(&mut self, frame: &Frame) -> Result<Option<HeadPose>, SignalError>;
}

/// Liveness / anti-spoofing classification of a frame.
pub trait LivenessClassifier: Send {
    fn classify(&mut self, frame: &Frame) -> Result<LivenessReading, SignalError>;
}

/// A single open audio input, polled by the audio watch thread.
pub trait AudioLevelMonitor: Send {
    /// Current volume on a 16-bit PCM norm scale.
    fn sample(&mut self) -> Result<f64, SignalError>;
}

/// An open video capture source. One instance backs one frame stream; the
/// stream is not restartable, a new stream re-opens the device.
pub trait FrameSource: Send {
    /// Next frame, or `None` when the source is exhausted. A read failure is
    /// treated as exhaustion, not an error to recover from.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Opens video capture sources on demand.
pub trait CaptureDevice: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, SignalError>;
}

/// Opens audio inputs on demand. Open failure propagates to `start`.
pub trait AudioDevice: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioLevelMonitor>, SignalError>;
}

/// Everything the frame loop extracts from one frame when a face is visible.
#[derive(Debug, Clone)]
pub struct FrameSignals {
    pub gaze: GazeReading,
    pub head: HeadPose,
    pub objects: ObjectReport,
    pub liveness: LivenessReading,
}

/// The per-frame analyzer stack, bundling the four frame-driven detectors.
pub struct AnalyzerStack {
    objects: Box<dyn ObjectPresenceDetector>,
    gaze: Box<dyn GazeEstimator>,
    head: Box<dyn HeadPoseEstimator>,
    liveness: Box<dyn LivenessClassifier>,
}

impl AnalyzerStack {
    pub fn new(
        objects: Box<dyn ObjectPresenceDetector>,
        gaze: Box<dyn GazeEstimator>,
        head: Box<dyn HeadPoseEstimator>,
        liveness: Box<dyn LivenessClassifier>,
    ) -> Self {
        Self {
            objects,
            gaze,
            head,
            liveness,
        }
    }

    /// Run all detectors over one frame.
    ///
    /// Returns `Ok(None)` when no face is visible (no tick is produced for
    /// such frames). Any detector error propagates and the caller skips the
    /// tick.
    pub fn analyze(&mut self, frame: &Frame) -> Result<Option<FrameSignals>, SignalError> {
        let gaze = match self.gaze.estimate(frame)? {
            Some(g) => g,
            None => return Ok(None),
        };
        let head = match self.head.estimate(frame)? {
            Some(h) => h,
            None => return Ok(None),
        };
        let objects = self.objects.detect(frame)?;
        let liveness = self.liveness.classify(frame)?;

        Ok(Some(FrameSignals {
            gaze,
            head,
            objects,
            liveness,
        }))
    }
}
