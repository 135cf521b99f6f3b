//! Durable storage for evidence clips.
//!
//! Frames arrive already JPEG-encoded from the capture layer, so a clip is
//! written as a Motion-JPEG stream: the episode's frames concatenated in
//! order. The clip's only structured metadata lives in its filename (see
//! [`ClipTag::file_stem`]); no index file is kept.

use crate::core::recorder::{ClipTag, ClipWriter};
use crate::signal::Frame;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File extension used for persisted clips.
pub const CLIP_EXTENSION: &str = "mjpeg";

/// Errors from clip storage operations.
#[derive(Debug)]
pub enum ClipError {
    Io(String),
    NotFound(String),
    InvalidName(String),
}

impl std::fmt::Display for ClipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipError::Io(e) => write!(f, "IO error: {e}"),
            ClipError::NotFound(name) => write!(f, "clip not found: {name}"),
            ClipError::InvalidName(name) => write!(f, "invalid clip name: {name}"),
        }
    }
}

impl std::error::Error for ClipError {}

/// A persisted clip as reported by [`ClipStore::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ClipRecord {
    pub filename: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Filesystem-backed clip storage rooted at one directory.
pub struct ClipStore {
    dir: PathBuf,
}

impl ClipStore {
    /// Open (creating if needed) a store at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ClipError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ClipError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// List persisted clips, oldest first.
    pub fn list(&self) -> Result<Vec<ClipRecord>, ClipError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ClipError::Io(e.to_string()))?;

        let mut clips = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ClipError::Io(e.to_string()))?;
            let path = entry.path();
            if path.extension().map(|e| e == CLIP_EXTENSION) != Some(true) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| ClipError::Io(e.to_string()))?;
            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            clips.push(ClipRecord {
                filename: entry.file_name().to_string_lossy().into_owned(),
                size_bytes: metadata.len(),
                created_at,
            });
        }
        clips.sort_by_key(|c| c.created_at);
        Ok(clips)
    }

    /// Delete one clip by filename.
    pub fn delete(&self, filename: &str) -> Result<(), ClipError> {
        Self::validate_name(filename)?;
        let path = self.dir.join(filename);
        if !path.exists() {
            return Err(ClipError::NotFound(filename.to_string()));
        }
        fs::remove_file(&path).map_err(|e| ClipError::Io(e.to_string()))
    }

    /// Reject path traversal and anything that is not a clip file.
    fn validate_name(filename: &str) -> Result<(), ClipError> {
        let valid = !filename.contains('/')
            && !filename.contains('\\')
            && !filename.contains("..")
            && filename.ends_with(&format!(".{CLIP_EXTENSION}"));
        if valid {
            Ok(())
        } else {
            Err(ClipError::InvalidName(filename.to_string()))
        }
    }
}

impl ClipWriter for ClipStore {
    fn persist(
        &self,
        frames: &[Frame],
        _frame_size: (u32, u32),
        _fps: f64,
        tag: &ClipTag,
    ) -> Result<PathBuf, ClipError> {
        let path = self
            .dir
            .join(format!("{}.{}", tag.file_stem(), CLIP_EXTENSION));

        let total: usize = frames.iter().map(|f| f.data.len()).sum();
        let mut bytes = Vec::with_capacity(total);
        for frame in frames {
            bytes.extend_from_slice(&frame.data);
        }

        fs::write(&path, bytes).map_err(|e| ClipError::Io(e.to_string()))?;
        Ok(path)
    }
}
