//! Signal fusion: raw per-frame signals in, flags and a verdict out.
//!
//! Fusion is a pure function of the current tick's signals. A single
//! suspicious signal is never enough; at least two independent flags must
//! co-occur in the same tick before it counts as cheating.

use crate::signal::{FrameSignals, GazeDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A discrete suspicious-behavior indicator contributing to the fusion vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    EyeMovement,
    HeadMovement,
    Sound,
    MultiplePersons,
    Book,
    Phone,
    Spoofing,
}

impl Flag {
    /// Stable snake_case name used in clip tags and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::EyeMovement => "eye_movement",
            Flag::HeadMovement => "head_movement",
            Flag::Sound => "sound",
            Flag::MultiplePersons => "multiple_persons",
            Flag::Book => "book",
            Flag::Phone => "phone",
            Flag::Spoofing => "spoofing",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of flags raised in one tick.
pub type FlagSet = BTreeSet<Flag>;

/// Join a flag set into the sorted, underscore-separated tag form
/// (e.g. `head_movement_sound`).
pub fn join_flags(flags: &FlagSet) -> String {
    let mut names: Vec<&str> = flags.iter().map(Flag::as_str).collect();
    names.sort_unstable();
    names.join("_")
}

/// Minimum number of co-occurring flags for an instantaneous cheating verdict.
pub const FUSION_VOTE_THRESHOLD: usize = 2;

/// Tunable limits the fusion rules evaluate signals against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FusionThresholds {
    /// Head yaw/pitch deflection limit in degrees
    pub head_angle_limit_deg: f64,
    /// Liveness confidence below which a frame is not accepted as genuine
    pub liveness_confidence_floor: f64,
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            head_angle_limit_deg: 10.0,
            liveness_confidence_floor: 0.7,
        }
    }
}

/// One evaluation cycle: timestamp, derived flags, instantaneous verdict.
///
/// Ticks are ephemeral; they are consumed by the recorder, the smoothing
/// window and the audit log, never persisted individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub at: DateTime<Utc>,
    pub flags: FlagSet,
    pub cheating: bool,
}

/// Fuse one frame's signals plus the shared sound flag into a tick.
pub fn fuse(
    at: DateTime<Utc>,
    signals: &FrameSignals,
    sound_detected: bool,
    thresholds: &FusionThresholds,
) -> Tick {
    let mut flags = FlagSet::new();

    if signals.gaze.direction != GazeDirection::Center {
        flags.insert(Flag::EyeMovement);
    }
    if signals.head.deflected(thresholds.head_angle_limit_deg) {
        flags.insert(Flag::HeadMovement);
    }
    if sound_detected {
        flags.insert(Flag::Sound);
    }
    if signals.objects.person_count > 1 {
        flags.insert(Flag::MultiplePersons);
    }
    if signals.objects.has_book {
        flags.insert(Flag::Book);
    }
    if signals.objects.has_phone {
        flags.insert(Flag::Phone);
    }
    if !signals.liveness.is_genuine(thresholds.liveness_confidence_floor) {
        flags.insert(Flag::Spoofing);
    }

    let cheating = flags.len() >= FUSION_VOTE_THRESHOLD;

    Tick { at, flags, cheating }
}
