//! Monitor configuration: TOML file merged with host overrides, then
//! range-validated once into an immutable value object every component
//! receives by reference.
//!
//! Out-of-range values clamp to safe defaults with a logged warning so the
//! monitor can always start, including fully zero-config.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::monitor::camera::RetryPolicy;

const DEFAULT_CAMERA_INDEX: i32 = 0;
const DEFAULT_CAPTURE_WIDTH: i32 = 640;
const DEFAULT_CAPTURE_HEIGHT: i32 = 480;
const DEFAULT_FPS_TARGET: u32 = 10;
const MAX_FPS_TARGET: u32 = 60;
const DEFAULT_ALERT_THRESHOLD_SECS: u64 = 600;
const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 300;
const DEFAULT_QUICK_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_QUICK_RETRY_DELAY_SECS: u64 = 1;
const DEFAULT_LONG_RETRY_DELAY_SECS: u64 = 10;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 15;
const DEFAULT_JPEG_QUALITY: i32 = 85;

/// Immutable validated runtime configuration.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub camera_index: i32,
    pub capture_width: i32,
    pub capture_height: i32,
    pub fps_target: u32,
    pub alert_threshold: Duration,
    pub alert_cooldown: Duration,
    pub retry: RetryPolicy,
    /// Must stay below half the supervisor's failure-declaration window.
    pub heartbeat_interval: Duration,
    pub heartbeat_path: Option<PathBuf>,
    pub publish_frames: bool,
    pub jpeg_quality: i32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            camera_index: DEFAULT_CAMERA_INDEX,
            capture_width: DEFAULT_CAPTURE_WIDTH,
            capture_height: DEFAULT_CAPTURE_HEIGHT,
            fps_target: DEFAULT_FPS_TARGET,
            alert_threshold: Duration::from_secs(DEFAULT_ALERT_THRESHOLD_SECS),
            alert_cooldown: Duration::from_secs(DEFAULT_ALERT_COOLDOWN_SECS),
            retry: RetryPolicy {
                quick_attempts: DEFAULT_QUICK_RETRY_ATTEMPTS,
                quick_delay: Duration::from_secs(DEFAULT_QUICK_RETRY_DELAY_SECS),
                long_delay: Duration::from_secs(DEFAULT_LONG_RETRY_DELAY_SECS),
            },
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            heartbeat_path: None,
            publish_frames: false,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// On-disk representation; every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub camera_index: Option<i32>,
    pub capture_width: Option<i32>,
    pub capture_height: Option<i32>,
    pub fps_target: Option<u32>,
    pub alert_threshold_secs: Option<u64>,
    pub alert_cooldown_secs: Option<u64>,
    pub quick_retry_attempts: Option<u32>,
    pub quick_retry_delay_secs: Option<u64>,
    pub long_retry_delay_secs: Option<u64>,
    pub heartbeat_interval_secs: Option<u64>,
    pub heartbeat_path: Option<PathBuf>,
    pub publish_frames: Option<bool>,
    pub jpeg_quality: Option<i32>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Host-supplied overrides applied on top of the file values.
#[derive(Debug, Default)]
pub struct Overrides {
    pub camera_index: Option<i32>,
    pub fps_target: Option<u32>,
    pub alert_threshold_secs: Option<u64>,
    pub alert_cooldown_secs: Option<u64>,
    pub heartbeat_path: Option<PathBuf>,
    pub publish_frames: Option<bool>,
}

/// Merge defaults, file values, and overrides, then validate the result.
pub fn resolve(file: ConfigFile, overrides: Overrides) -> MonitorConfig {
    let defaults = MonitorConfig::default();
    let config = MonitorConfig {
        camera_index: overrides
            .camera_index
            .or(file.camera_index)
            .unwrap_or(defaults.camera_index),
        capture_width: file.capture_width.unwrap_or(defaults.capture_width),
        capture_height: file.capture_height.unwrap_or(defaults.capture_height),
        fps_target: overrides
            .fps_target
            .or(file.fps_target)
            .unwrap_or(defaults.fps_target),
        alert_threshold: overrides
            .alert_threshold_secs
            .or(file.alert_threshold_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.alert_threshold),
        alert_cooldown: overrides
            .alert_cooldown_secs
            .or(file.alert_cooldown_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.alert_cooldown),
        retry: RetryPolicy {
            quick_attempts: file
                .quick_retry_attempts
                .unwrap_or(defaults.retry.quick_attempts),
            quick_delay: file
                .quick_retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.quick_delay),
            long_delay: file
                .long_retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.long_delay),
        },
        heartbeat_interval: file
            .heartbeat_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.heartbeat_interval),
        heartbeat_path: overrides.heartbeat_path.or(file.heartbeat_path),
        publish_frames: overrides
            .publish_frames
            .or(file.publish_frames)
            .unwrap_or(defaults.publish_frames),
        jpeg_quality: file.jpeg_quality.unwrap_or(defaults.jpeg_quality),
    };
    config.validated()
}

impl MonitorConfig {
    /// Clamp out-of-range fields to defaults, warning about each.
    fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.camera_index < 0 {
            warn!(
                "camera_index {} out of range; using {}",
                self.camera_index, defaults.camera_index
            );
            self.camera_index = defaults.camera_index;
        }
        if self.capture_width <= 0 || self.capture_height <= 0 {
            warn!(
                "capture size {}x{} out of range; using {}x{}",
                self.capture_width,
                self.capture_height,
                defaults.capture_width,
                defaults.capture_height
            );
            self.capture_width = defaults.capture_width;
            self.capture_height = defaults.capture_height;
        }
        if self.fps_target == 0 {
            warn!("fps_target 0 out of range; using {}", defaults.fps_target);
            self.fps_target = defaults.fps_target;
        } else if self.fps_target > MAX_FPS_TARGET {
            warn!(
                "fps_target {} above maximum; clamping to {}",
                self.fps_target, MAX_FPS_TARGET
            );
            self.fps_target = MAX_FPS_TARGET;
        }
        if self.alert_threshold.is_zero() {
            warn!(
                "alert_threshold_secs 0 out of range; using {}",
                defaults.alert_threshold.as_secs()
            );
            self.alert_threshold = defaults.alert_threshold;
        }
        if self.alert_cooldown.is_zero() {
            warn!(
                "alert_cooldown_secs 0 out of range; using {}",
                defaults.alert_cooldown.as_secs()
            );
            self.alert_cooldown = defaults.alert_cooldown;
        }
        if self.retry.quick_attempts == 0 {
            warn!(
                "quick_retry_attempts 0 out of range; using {}",
                defaults.retry.quick_attempts
            );
            self.retry.quick_attempts = defaults.retry.quick_attempts;
        }
        if self.retry.quick_delay.is_zero() {
            warn!(
                "quick_retry_delay_secs 0 out of range; using {}",
                defaults.retry.quick_delay.as_secs()
            );
            self.retry.quick_delay = defaults.retry.quick_delay;
        }
        if self.retry.long_delay.is_zero() {
            warn!(
                "long_retry_delay_secs 0 out of range; using {}",
                defaults.retry.long_delay.as_secs()
            );
            self.retry.long_delay = defaults.retry.long_delay;
        }
        if self.heartbeat_interval.is_zero() {
            warn!(
                "heartbeat_interval_secs 0 out of range; using {}",
                defaults.heartbeat_interval.as_secs()
            );
            self.heartbeat_interval = defaults.heartbeat_interval;
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            warn!(
                "jpeg_quality {} out of range; using {}",
                self.jpeg_quality, defaults.jpeg_quality
            );
            self.jpeg_quality = defaults.jpeg_quality;
        }

        self
    }

    /// Frame period derived from the FPS target.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps_target.max(1)))
    }
}
