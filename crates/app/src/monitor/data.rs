//! Records crossing the presentation boundary.

use pose_core::PostureState;
use serde::Serialize;

use crate::monitor::alert::AlertOutcome;
use crate::monitor::camera::CameraState;

/// Unit published through the result slot once per successfully processed
/// frame. Internally consistent: `camera_state` is the state that produced
/// `posture` in the same iteration.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineResult {
    pub timestamp_ms: i64,
    pub posture: PostureState,
    pub user_present: bool,
    pub confidence: f32,
    #[serde(skip_serializing)]
    pub frame_jpeg: Option<Vec<u8>>,
    pub camera_state: CameraState,
    pub alert: AlertOutcome,
}

/// Out-of-band notifications for the presentation layer, delivered over a
/// bounded channel with drop-on-full semantics.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    CameraState {
        from: CameraState,
        to: CameraState,
        timestamp_ms: i64,
    },
}
