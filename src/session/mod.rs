//! Session lifecycle: timing, the per-user audit log, and the controller
//! that owns both.

pub mod audit;
pub mod clock;
pub mod controller;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditLog, AuditStats, SharedAuditLog};
pub use clock::SessionClock;
pub use controller::{FrameStream, FrameUpdate, SessionController, SessionError, SessionStatus};
