//! Configuration for the exam sentinel.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the proctoring monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Total allotted exam duration
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,

    /// Minimum cheating-episode length for a clip to be persisted
    #[serde(with = "duration_serde")]
    pub minimum_cheating_duration: Duration,

    /// Trailing window over which verdicts are majority-smoothed
    #[serde(with = "duration_serde")]
    pub smoothing_window: Duration,

    /// Frame rate evidence clips are written at
    pub output_fps: f64,

    /// Ambient-sound volume threshold (16-bit PCM norm scale)
    pub sound_threshold: f64,

    /// Head yaw/pitch deflection limit in degrees
    pub head_angle_limit_deg: f64,

    /// Liveness confidence floor below which a frame counts as spoofed
    pub liveness_confidence_floor: f64,

    /// Directory evidence clips are written to
    pub recordings_dir: PathBuf,

    /// Path for storing state and audit logs
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exam-sentinel");

        Self {
            total_duration: Duration::from_secs(100),
            minimum_cheating_duration: Duration::from_secs(3),
            smoothing_window: Duration::from_secs(30),
            output_fps: 20.0,
            sound_threshold: 500.0,
            head_angle_limit_deg: 10.0,
            liveness_confidence_floor: 0.7,
            recordings_dir: data_dir.join("cheating_recordings"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("exam-sentinel")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.recordings_dir)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
