//! Exam Sentinel CLI
//!
//! Signal-fusion exam proctoring monitor.

use clap::{Parser, Subcommand};
use exam_sentinel::{
    clips::ClipStore,
    config::Config,
    session::{AuditLog, SessionController},
    signal::{SyntheticAudio, SyntheticCapture, SyntheticScript},
    VERSION,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "exam-sentinel")]
#[command(version = VERSION)]
#[command(about = "Signal-fusion exam proctoring monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP proctoring server (requires the `server` feature)
    Serve {
        /// Port to bind to (0 for random)
        #[arg(long, default_value = "8000")]
        port: u16,
    },

    /// Run one monitoring session in the foreground with synthetic signals
    Run {
        /// Username the session is keyed under
        #[arg(long, default_value = "demo")]
        username: String,

        /// Exam duration in seconds (falls back to configured default)
        #[arg(long)]
        duration: Option<u64>,

        /// Capture frame rate for the synthetic source
        #[arg(long, default_value = "2.0")]
        fps: f64,
    },

    /// Show configuration and cumulative audit statistics
    Status,

    /// List persisted evidence clips
    Clips,

    /// Delete one persisted evidence clip by filename
    DeleteClip {
        filename: String,
    },

    /// Show configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => cmd_serve(port),
        Commands::Run {
            username,
            duration,
            fps,
        } => cmd_run(&username, duration, fps),
        Commands::Status => cmd_status(),
        Commands::Clips => cmd_clips(),
        Commands::DeleteClip { filename } => cmd_delete_clip(&filename),
        Commands::Config => cmd_config(),
    }
}

/// Build a controller over synthetic providers. Real detector integrations
/// plug their own `CaptureDevice`/`AnalyzerStack`/`AudioDevice` in here.
fn build_controller(config: Config, fps: f64) -> Arc<SessionController> {
    let clips = ClipStore::new(&config.recordings_dir).unwrap_or_else(|e| {
        eprintln!("Error opening clip store: {e}");
        std::process::exit(1);
    });
    let audit = Arc::new(AuditLog::with_persistence(
        config.data_path.join("audit_log.json"),
    ));

    Arc::new(SessionController::new(
        config,
        Box::new(SyntheticCapture::new(640, 480, fps)),
        SyntheticScript::quiet().stack(),
        Box::new(SyntheticAudio::silent()),
        Arc::new(clips),
        audit,
    ))
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let controller = build_controller(config, 20.0);

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Error starting runtime: {e}");
        std::process::exit(1);
    });

    let result: anyhow::Result<()> = runtime.block_on(async move {
        let (addr, shutdown_tx) =
            exam_sentinel::server::run(exam_sentinel::server::ServerConfig::new(port), controller)
                .await?;
        println!("Exam Sentinel v{VERSION} listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        Ok(())
    });

    if let Err(e) = result {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_port: u16) {
    eprintln!("Error: this binary was built without the `server` feature.");
    eprintln!("Rebuild with: cargo build --features server");
    std::process::exit(1);
}

fn cmd_run(username: &str, duration: Option<u64>, fps: f64) {
    println!("Exam Sentinel v{VERSION}");
    println!();

    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let total = duration.unwrap_or(config.total_duration.as_secs());
    println!("Starting session for {username} ({total}s)...");
    println!("  Smoothing window: {}s", config.smoothing_window.as_secs());
    println!(
        "  Minimum cheating duration: {}s",
        config.minimum_cheating_duration.as_secs()
    );
    println!("  Recordings: {}", config.recordings_dir.display());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let controller = build_controller(config, fps);

    if let Err(e) = controller.start(username, duration) {
        eprintln!("Error starting session: {e}");
        std::process::exit(1);
    }

    // Ctrl+C requests a cooperative stop; the stream ends on its next tick.
    let handler_controller = controller.clone();
    ctrlc::set_handler(move || {
        let _ = handler_controller.stop();
    })
    .expect("Error setting Ctrl+C handler");

    let stream = match controller.stream_frames(username) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Error opening stream: {e}");
            std::process::exit(1);
        }
    };

    for update in stream {
        if let Some(tick) = update.tick {
            let flags = if tick.flags.is_empty() {
                "-".to_string()
            } else {
                exam_sentinel::core::join_flags(&tick.flags)
            };
            println!(
                "[{}] flags: {} | instantaneous: {} | smoothed: {}",
                tick.at.format("%H:%M:%S"),
                flags,
                if tick.cheating { "CHEATING" } else { "ok" },
                if update.smoothed_verdict {
                    "CHEATING"
                } else {
                    "ok"
                },
            );
        }
    }

    let _ = controller.stop();

    println!();
    let stats = controller.audit().stats(username);
    println!("Session summary for {username}:");
    println!("  Entries: {}", stats.total_entries);
    println!("  Cheating instances: {}", stats.cheating_instances);
    println!("  Cheating percentage: {:.2}%", stats.cheating_percentage);
    println!("  Duration: {:.1}s", stats.total_duration_secs);
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Exam Sentinel Status");
    println!("====================");
    println!();
    println!("Configuration:");
    println!("  Total duration: {}s", config.total_duration.as_secs());
    println!(
        "  Minimum cheating duration: {}s",
        config.minimum_cheating_duration.as_secs()
    );
    println!("  Smoothing window: {}s", config.smoothing_window.as_secs());
    println!("  Output fps: {}", config.output_fps);
    println!("  Sound threshold: {}", config.sound_threshold);
    println!("  Recordings: {}", config.recordings_dir.display());
    println!();

    // Cumulative audit stats from the persisted log, if any.
    let audit_path = config.data_path.join("audit_log.json");
    if audit_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&audit_path) {
            if let Ok(log) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(users) = log.get("users").and_then(|u| u.as_object()) {
                    println!("Audit log:");
                    for (username, entries) in users {
                        let count = entries.as_array().map(|a| a.len()).unwrap_or(0);
                        println!("  {username}: {count} entries");
                    }
                    return;
                }
            }
        }
        println!("Audit log present but unreadable.");
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_clips() {
    let config = Config::load().unwrap_or_default();
    let store = match ClipStore::new(&config.recordings_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening clip store: {e}");
            std::process::exit(1);
        }
    };

    match store.list() {
        Ok(clips) if clips.is_empty() => {
            println!("No evidence clips in {}", config.recordings_dir.display());
        }
        Ok(clips) => {
            println!("{} clip(s) in {}:", clips.len(), config.recordings_dir.display());
            for clip in clips {
                println!(
                    "  {}  {:.2} MB  {}",
                    clip.filename,
                    clip.size_bytes as f64 / (1024.0 * 1024.0),
                    clip.created_at.format("%Y-%m-%d %H:%M:%S"),
                );
            }
        }
        Err(e) => {
            eprintln!("Error listing clips: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_delete_clip(filename: &str) {
    let config = Config::load().unwrap_or_default();
    let store = match ClipStore::new(&config.recordings_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening clip store: {e}");
            std::process::exit(1);
        }
    };

    match store.delete(filename) {
        Ok(()) => println!("Deleted {filename}"),
        Err(e) => {
            eprintln!("Error deleting clip: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}
