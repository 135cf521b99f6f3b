//! Core functionality for the exam sentinel.
//!
//! This module contains:
//! - Signal fusion into per-tick flags and verdicts
//! - Temporal smoothing of verdicts over a rolling window
//! - The evidence-recording state machine

pub mod fusion;
pub mod recorder;
pub mod smoothing;

// Re-export commonly used types
pub use fusion::{fuse, join_flags, Flag, FlagSet, FusionThresholds, Tick, FUSION_VOTE_THRESHOLD};
pub use recorder::{ClipEvent, ClipTag, ClipWriter, EvidenceRecorder};
pub use smoothing::VerdictWindow;
