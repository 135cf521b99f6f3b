//! Per-user audit log of smoothed verdicts.
//!
//! Every processed tick appends one (elapsed seconds, smoothed verdict) pair
//! to the log of the session's username. The log is append-only and is the
//! basis for all reporting. Multiple sessions under the same username append
//! to the same log unless it is explicitly cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One audit entry: seconds into the session, and the smoothed verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuditEntry {
    pub elapsed_secs: f64,
    pub cheating: bool,
}

/// Summary statistics over one user's log.
#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    pub total_entries: usize,
    pub cheating_instances: usize,
    pub clean_instances: usize,
    pub cheating_percentage: f64,
    pub total_duration_secs: f64,
}

/// The per-user audit log, shared between sessions and the service layer.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<HashMap<String, Vec<AuditEntry>>>,
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            persist_path: None,
        }
    }

    /// Create an audit log persisted to the given path, loading any previous
    /// contents.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            eprintln!("Note: Could not load previous audit log: {e}");
        }

        log
    }

    /// Append one entry to a user's log.
    pub fn append(&self, username: &str, entry: AuditEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(username.to_string()).or_default().push(entry);
    }

    /// All entries for a user, in append order. Unknown users get an empty
    /// log, not an error.
    pub fn entries_for(&self, username: &str) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap();
        entries.get(username).cloned().unwrap_or_default()
    }

    /// Summary statistics for one user.
    pub fn stats(&self, username: &str) -> AuditStats {
        let entries = self.entries_for(username);
        let total_entries = entries.len();
        let cheating_instances = entries.iter().filter(|e| e.cheating).count();
        let cheating_percentage = if total_entries > 0 {
            cheating_instances as f64 / total_entries as f64 * 100.0
        } else {
            0.0
        };
        let total_duration_secs = entries.last().map(|e| e.elapsed_secs).unwrap_or(0.0);

        AuditStats {
            total_entries,
            cheating_instances,
            clean_instances: total_entries - cheating_instances,
            cheating_percentage,
            total_duration_secs,
        }
    }

    /// Drop one user's log.
    pub fn clear(&self, username: &str) {
        self.entries.lock().unwrap().remove(username);
    }

    /// Save the log to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let entries = self.entries.lock().unwrap();
            let persisted = PersistedLog {
                users: entries.clone(),
                last_updated: Utc::now(),
            };
            drop(entries);

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load the log from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedLog =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;
                *self.entries.lock().unwrap() = persisted.users;
            }
        }
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Log format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedLog {
    users: HashMap<String, Vec<AuditEntry>>,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let log = AuditLog::new();
        log.append(
            "alice",
            AuditEntry {
                elapsed_secs: 1.0,
                cheating: false,
            },
        );
        log.append(
            "alice",
            AuditEntry {
                elapsed_secs: 2.0,
                cheating: true,
            },
        );

        let entries = log.entries_for("alice");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].elapsed_secs < entries[1].elapsed_secs);
        assert!(entries[1].cheating);
    }

    #[test]
    fn test_unknown_user_is_empty_not_error() {
        let log = AuditLog::new();
        assert!(log.entries_for("nobody").is_empty());

        let stats = log.stats("nobody");
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.cheating_percentage, 0.0);
    }

    #[test]
    fn test_stats() {
        let log = AuditLog::new();
        for i in 0..4 {
            log.append(
                "bob",
                AuditEntry {
                    elapsed_secs: i as f64,
                    cheating: i >= 3,
                },
            );
        }

        let stats = log.stats("bob");
        assert_eq!(stats.total_entries, 4);
        assert_eq!(stats.cheating_instances, 1);
        assert_eq!(stats.clean_instances, 3);
        assert!((stats.cheating_percentage - 25.0).abs() < 0.001);
        assert!((stats.total_duration_secs - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!("exam-sentinel-audit-{}.json", uuid::Uuid::new_v4()));

        let log = AuditLog::with_persistence(path.clone());
        log.append(
            "carol",
            AuditEntry {
                elapsed_secs: 0.5,
                cheating: true,
            },
        );
        log.save().unwrap();

        let reloaded = AuditLog::with_persistence(path.clone());
        let entries = reloaded.entries_for("carol");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].cheating);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_clear_drops_one_user_only() {
        let log = AuditLog::new();
        log.append(
            "alice",
            AuditEntry {
                elapsed_secs: 1.0,
                cheating: false,
            },
        );
        log.append(
            "bob",
            AuditEntry {
                elapsed_secs: 1.0,
                cheating: false,
            },
        );

        log.clear("alice");
        assert!(log.entries_for("alice").is_empty());
        assert_eq!(log.entries_for("bob").len(), 1);
    }
}
