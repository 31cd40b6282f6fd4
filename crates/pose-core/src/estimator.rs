use frame_capture::Frame;

use crate::Landmarks;

/// Immutable per-frame output of a pose estimation backend.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    /// `None` when no person was found in the frame.
    pub landmarks: Option<Landmarks>,
    pub user_present: bool,
    /// Backend confidence in `[0, 1]`.
    pub confidence: f32,
}

impl DetectionResult {
    /// Result for a frame in which no person was detected.
    pub fn absent() -> Self {
        Self {
            landmarks: None,
            user_present: false,
            confidence: 0.0,
        }
    }
}

/// Synchronous, CPU-bound pose estimation adapter.
///
/// The pipeline treats `detect` latency as an opaque cost against its frame
/// budget and absorbs errors at the per-iteration fault boundary.
pub trait PoseEstimator: Send {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<DetectionResult>;
}
