use std::path::PathBuf;

use clap::Parser;

use app::monitor::Overrides;

/// Desk posture monitor: samples a camera, classifies posture, and raises
/// rate-limited alerts.
#[derive(Debug, Parser)]
#[command(name = "posture-monitor", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Camera device index (overrides the config file).
    #[arg(long = "camera", value_name = "INDEX")]
    pub camera_index: Option<i32>,
    /// Target sampling rate in frames per second.
    #[arg(long = "fps", value_name = "FPS")]
    pub fps: Option<u32>,
    /// Continuous bad-posture seconds before an alert fires.
    #[arg(long = "threshold", value_name = "SECS")]
    pub threshold_secs: Option<u64>,
    /// Minimum seconds between alerts for the same episode.
    #[arg(long = "cooldown", value_name = "SECS")]
    pub cooldown_secs: Option<u64>,
    /// Liveness file written for the process supervisor.
    #[arg(long = "heartbeat-file", value_name = "PATH")]
    pub heartbeat_file: Option<PathBuf>,
    /// Use the synthetic frame source and pose instead of a camera.
    #[arg(long = "synthetic", action = clap::ArgAction::SetTrue)]
    pub synthetic: bool,
    /// Include encoded frames in published results.
    #[arg(long = "publish-frames", action = clap::ArgAction::SetTrue)]
    pub publish_frames: bool,
    /// Emit verbose logging.
    #[arg(long = "verbose", action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            camera_index: self.camera_index,
            fps_target: self.fps,
            alert_threshold_secs: self.threshold_secs,
            alert_cooldown_secs: self.cooldown_secs,
            heartbeat_path: self.heartbeat_file.clone(),
            publish_frames: self.publish_frames.then_some(true),
        }
    }
}
