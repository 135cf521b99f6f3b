//! Exam Sentinel - signal-fusion proctoring monitor for timed exam sessions.
//!
//! This library fuses several independent, noisy per-frame signals (gaze,
//! head pose, presence count, object detections, liveness, ambient sound)
//! into a cheating verdict, smooths it over a rolling window, records
//! sustained episodes as evidence clips, and keeps a per-user audit log.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Exam Sentinel                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌─────────┐  │
//! │  │  Signal   │──▶│  Fusion  │──▶│ Smoothing │──▶│  Audit  │  │
//! │  │ providers │   │ (flags)  │   │ (majority)│   │   log   │  │
//! │  └───────────┘   └────┬─────┘   └───────────┘   └─────────┘  │
//! │        │              │                                      │
//! │        ▼              ▼                                      │
//! │  ┌───────────┐   ┌──────────┐                                │
//! │  │   Audio   │   │ Evidence │──▶ clip store                  │
//! │  │   watch   │   │ recorder │                                │
//! │  └───────────┘   └──────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The detectors themselves are external collaborators behind the traits in
//! [`signal`]; the core never loads a model.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use exam_sentinel::clips::ClipStore;
//! use exam_sentinel::config::Config;
//! use exam_sentinel::session::{AuditLog, SessionController};
//! use exam_sentinel::signal::{SyntheticAudio, SyntheticCapture, SyntheticScript};
//!
//! let config = Config::default();
//! let clips = Arc::new(ClipStore::new(&config.recordings_dir).expect("clip store"));
//! let controller = Arc::new(SessionController::new(
//!     config,
//!     Box::new(SyntheticCapture::new(640, 480, 20.0)),
//!     SyntheticScript::quiet().stack(),
//!     Box::new(SyntheticAudio::silent()),
//!     clips,
//!     Arc::new(AuditLog::new()),
//! ));
//!
//! controller.start("alice", Some(100)).expect("start session");
//! for update in controller.stream_frames("alice").expect("stream") {
//!     // hand update.frame to the transport layer
//!     let _ = update.smoothed_verdict;
//! }
//! ```

pub mod clips;
pub mod config;
pub mod core;
pub mod session;
pub mod signal;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use clips::{ClipError, ClipRecord, ClipStore};
pub use config::{Config, ConfigError};
pub use core::{fuse, Flag, FlagSet, FusionThresholds, Tick, VerdictWindow};
pub use core::{ClipEvent, ClipTag, ClipWriter, EvidenceRecorder};
pub use session::{
    AuditEntry, AuditLog, AuditStats, FrameStream, FrameUpdate, SessionClock, SessionController,
    SessionError, SessionStatus, SharedAuditLog,
};
pub use signal::{AnalyzerStack, Frame, FrameSignals, SignalError, SoundLevel};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
