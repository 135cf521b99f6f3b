//! Ambient-sound monitoring.
//!
//! A dedicated thread polls the audio device at a fixed cadence and publishes
//! the latest reading into a single shared slot. The frame loop reads the
//! slot without blocking; no other state crosses the thread boundary.

use crate::signal::AudioLevelMonitor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the audio watch samples the device (~10 Hz).
pub const AUDIO_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Single-slot shared sound state: one writer (the audio watch thread), one
/// reader (the frame loop).
#[derive(Debug)]
pub struct SoundLevel {
    detected: AtomicBool,
    /// Last sampled volume, stored as f64 bits
    volume_bits: AtomicU64,
}

impl SoundLevel {
    pub fn new() -> Self {
        Self {
            detected: AtomicBool::new(false),
            volume_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Publish a new sample, flagging it against the threshold.
    pub fn update(&self, volume: f64, threshold: f64) {
        self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
        self.detected.store(volume > threshold, Ordering::Relaxed);
    }

    /// Clear the flag (used when the watch stops).
    pub fn clear(&self) {
        self.detected.store(false, Ordering::Relaxed);
        self.volume_bits.store(0f64.to_bits(), Ordering::Relaxed);
    }

    pub fn detected(&self) -> bool {
        self.detected.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }
}

impl Default for SoundLevel {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to the background audio-polling thread.
pub struct AudioWatch {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioWatch {
    /// Spawn the polling thread over an already-open monitor.
    ///
    /// A sample failure stops the watch and clears the sound flag; there is
    /// no retry. The session keeps running without the sound signal.
    pub fn spawn(
        mut monitor: Box<dyn AudioLevelMonitor>,
        level: Arc<SoundLevel>,
        threshold: f64,
        interval: Duration,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let handle = thread::spawn(move || {
            while thread_running.load(Ordering::SeqCst) {
                match monitor.sample() {
                    Ok(volume) => level.update(volume, threshold),
                    Err(e) => {
                        eprintln!("Audio watch stopped: {e}");
                        level.clear();
                        break;
                    }
                }
                thread::sleep(interval);
            }
            level.clear();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Request a cooperative stop and wait for the thread to exit.
    ///
    /// Stop is observed at the next poll cycle, so up to one interval of
    /// continued sampling is expected.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }
}

impl Drop for AudioWatch {
    fn drop(&mut self) {
        self.stop();
    }
}
