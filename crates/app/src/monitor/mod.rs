//! Real-time posture sensing pipeline: a background worker samples the
//! camera, runs pose estimation and classification, tracks bad-posture
//! duration, and publishes results through a latest-wins slot.
//!
//! The module is split into focused submodules:
//! - `config`: validated immutable runtime configuration (TOML + overrides).
//! - `pipeline`: orchestrates the capture → detect → classify → alert loop.
//! - `camera`: connection state machine driving the tiered retry schedule.
//! - `alert`: continuous bad-posture duration tracking and alert gating.
//! - `slot`: capacity-1 latest-wins handoff to presentation consumers.
//! - `heartbeat`: worker pulse and supervisor liveness signalling.
//! - `telemetry`: tracing and Prometheus metrics bootstrap.
//! - `data`: records crossing the presentation boundary.

pub use alert::{AlertOutcome, AlertStatus, AlertTracker};
pub use camera::{CameraState, CameraSupervisor, RetryDirective, RetryPolicy};
pub use config::{ConfigFile, MonitorConfig, Overrides};
pub use data::{MonitorEvent, PipelineResult};
pub use heartbeat::{FileLiveness, LivenessSink, LogLiveness, WorkerPulse};
pub use pipeline::{Monitor, MonitorParts};
pub use slot::ResultSlot;

pub mod alert;
pub mod camera;
pub mod config;
pub mod data;
pub mod heartbeat;
pub mod pipeline;
pub mod slot;
pub mod telemetry;
