//! Signal types produced by the external detectors.
//!
//! The core never runs a model itself; these types are the boundary between
//! the fusion engine and whatever estimator stack feeds it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured video frame, already encoded by the capture layer.
///
/// The core treats the pixel data as opaque bytes; decoding and codec choice
/// belong to the capture collaborator.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes (JPEG from the reference capture stack)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when the frame was captured
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    /// Frame dimensions as a (width, height) pair.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Categorical gaze direction derived from the iris-position ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GazeDirection {
    Left,
    Center,
    Right,
}

impl GazeDirection {
    /// Bucket a continuous iris ratio into a direction.
    ///
    /// ratio < 0.4 means the iris sits toward the right corner; 0.4..=0.55 is
    /// centered; anything above is left.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.4 {
            GazeDirection::Right
        } else if ratio <= 0.55 {
            GazeDirection::Center
        } else {
            GazeDirection::Left
        }
    }

    pub fn is_centered(&self) -> bool {
        matches!(self, GazeDirection::Center)
    }
}

/// Gaze estimate for a single frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GazeReading {
    pub direction: GazeDirection,
    /// Raw iris-position ratio the direction was bucketed from
    pub ratio: f64,
}

impl GazeReading {
    pub fn from_ratio(ratio: f64) -> Self {
        Self {
            direction: GazeDirection::from_ratio(ratio),
            ratio,
        }
    }
}

/// Head orientation in degrees, relative to facing the camera.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw_deg: f64,
    pub pitch_deg: f64,
}

impl HeadPose {
    pub fn new(yaw_deg: f64, pitch_deg: f64) -> Self {
        Self { yaw_deg, pitch_deg }
    }

    /// Whether either axis exceeds the configured deflection limit.
    pub fn deflected(&self, limit_deg: f64) -> bool {
        self.yaw_deg.abs() > limit_deg || self.pitch_deg.abs() > limit_deg
    }
}

/// What the object detector saw in a frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ObjectReport {
    pub person_count: u32,
    pub has_book: bool,
    pub has_phone: bool,
}

/// Liveness classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LivenessLabel {
    Real,
    Spoof,
    Unknown,
}

/// Liveness classifier output for a single frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LivenessReading {
    pub label: LivenessLabel,
    pub confidence: f64,
}

impl LivenessReading {
    pub fn new(label: LivenessLabel, confidence: f64) -> Self {
        Self { label, confidence }
    }

    /// A reading counts as genuine only when the classifier says `Real` with
    /// confidence at or above the floor. A confidence of exactly zero is an
    /// unclassified frame and is never accepted as genuine.
    pub fn is_genuine(&self, confidence_floor: f64) -> bool {
        self.label == LivenessLabel::Real && self.confidence >= confidence_floor
    }
}

/// Errors surfaced by signal collaborators.
#[derive(Debug)]
pub enum SignalError {
    /// The capture device could not be opened or read
    CaptureUnavailable(String),
    /// The audio device could not be opened or sampled
    AudioUnavailable(String),
    /// A detector or classifier failed on this frame
    Analysis(String),
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::CaptureUnavailable(e) => write!(f, "capture unavailable: {e}"),
            SignalError::AudioUnavailable(e) => write!(f, "audio unavailable: {e}"),
            SignalError::Analysis(e) => write!(f, "analysis failed: {e}"),
        }
    }
}

impl std::error::Error for SignalError {}
