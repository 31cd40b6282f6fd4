//! Scripted pose estimator for demos and unattended tests.
//!
//! Real backends are wired in by embedding code; this one fabricates a
//! plausible 33-point pose that alternates between upright and slouched so a
//! full pipeline can be exercised without a model or a person.

use frame_capture::Frame;

use crate::landmarks::{landmark_index as idx, Landmark, Landmarks};
use crate::{DetectionResult, PoseEstimator};

/// Alternates between an upright and a slouched pose on a fixed cadence.
pub struct SyntheticEstimator {
    frames_per_phase: u64,
    counter: u64,
}

impl SyntheticEstimator {
    pub fn new(frames_per_phase: u64) -> Self {
        Self {
            frames_per_phase: frames_per_phase.max(1),
            counter: 0,
        }
    }
}

impl PoseEstimator for SyntheticEstimator {
    fn detect(&mut self, _frame: &Frame) -> anyhow::Result<DetectionResult> {
        let slouched = (self.counter / self.frames_per_phase) % 2 == 1;
        self.counter = self.counter.wrapping_add(1);
        Ok(DetectionResult {
            landmarks: Some(pose_landmarks(slouched)),
            user_present: true,
            confidence: 0.92,
        })
    }
}

/// Build a full landmark set with the torso placed upright or slouched.
pub fn pose_landmarks(slouched: bool) -> Landmarks {
    let mut points = vec![
        Landmark {
            x: 0.5,
            y: 0.5,
            z: 0.0,
            visibility: 0.9,
        };
        idx::COUNT
    ];
    let place = |points: &mut Vec<Landmark>, index: usize, x: f32, y: f32| {
        points[index] = Landmark {
            x,
            y,
            z: 0.0,
            visibility: 0.9,
        };
    };

    place(&mut points, idx::LEFT_SHOULDER, 0.40, 0.55);
    place(&mut points, idx::RIGHT_SHOULDER, 0.60, 0.55);
    place(&mut points, idx::LEFT_HIP, 0.42, 0.85);
    place(&mut points, idx::RIGHT_HIP, 0.58, 0.85);
    if slouched {
        place(&mut points, idx::NOSE, 0.75, 0.35);
        place(&mut points, idx::LEFT_EAR, 0.65, 0.40);
        place(&mut points, idx::RIGHT_EAR, 0.75, 0.40);
    } else {
        place(&mut points, idx::NOSE, 0.50, 0.25);
        place(&mut points, idx::LEFT_EAR, 0.45, 0.32);
        place(&mut points, idx::RIGHT_EAR, 0.55, 0.32);
    }
    Landmarks::new(points)
}
