use serde::Serialize;

use crate::landmarks::{landmark_index as idx, Landmark, Landmarks};

/// Binary posture judgement for a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureState {
    Good,
    Bad,
    /// No person or no usable landmarks in the frame.
    Unknown,
}

impl PostureState {
    pub fn label(self) -> &'static str {
        match self {
            PostureState::Good => "good",
            PostureState::Bad => "bad",
            PostureState::Unknown => "unknown",
        }
    }
}

/// Single-method classification strategy.
///
/// The exact geometry is product-tuning logic; swapping the strategy is a
/// constructor argument of the pipeline, not a code change.
pub trait PostureClassifier: Send {
    fn classify(&self, landmarks: &Landmarks) -> PostureState;
}

/// Tunable thresholds for [`TorsoGeometryClassifier`].
#[derive(Clone, Copy, Debug)]
pub struct ClassifierThresholds {
    /// Maximum head-forward angle in degrees from vertical.
    pub max_neck_angle_deg: f32,
    /// Maximum torso inclination in degrees from vertical.
    pub max_torso_angle_deg: f32,
    /// Landmarks below this visibility are treated as unusable.
    pub min_visibility: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            max_neck_angle_deg: 35.0,
            max_torso_angle_deg: 25.0,
            min_visibility: 0.5,
        }
    }
}

/// Default strategy: neck inclination from the ear/shoulder midpoints, plus
/// torso inclination from the shoulder/hip midpoints when hips are visible.
pub struct TorsoGeometryClassifier {
    thresholds: ClassifierThresholds,
}

impl TorsoGeometryClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }
}

impl Default for TorsoGeometryClassifier {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}

impl PostureClassifier for TorsoGeometryClassifier {
    fn classify(&self, landmarks: &Landmarks) -> PostureState {
        let t = self.thresholds;
        let (Some(left_shoulder), Some(right_shoulder), Some(left_ear), Some(right_ear)) = (
            usable(landmarks, idx::LEFT_SHOULDER, t.min_visibility),
            usable(landmarks, idx::RIGHT_SHOULDER, t.min_visibility),
            usable(landmarks, idx::LEFT_EAR, t.min_visibility),
            usable(landmarks, idx::RIGHT_EAR, t.min_visibility),
        ) else {
            return PostureState::Unknown;
        };

        let shoulder_mid = midpoint(left_shoulder, right_shoulder);
        let ear_mid = midpoint(left_ear, right_ear);
        let neck_angle = angle_from_vertical(shoulder_mid, ear_mid);

        // Hips drop out of frame for seated users; torso inclination is only
        // judged when both are visible.
        let torso_angle = match (
            usable(landmarks, idx::LEFT_HIP, t.min_visibility),
            usable(landmarks, idx::RIGHT_HIP, t.min_visibility),
        ) {
            (Some(left_hip), Some(right_hip)) => {
                let hip_mid = midpoint(left_hip, right_hip);
                Some(angle_from_vertical(hip_mid, shoulder_mid))
            }
            _ => None,
        };

        if neck_angle > t.max_neck_angle_deg
            || torso_angle.is_some_and(|angle| angle > t.max_torso_angle_deg)
        {
            PostureState::Bad
        } else {
            PostureState::Good
        }
    }
}

fn usable(landmarks: &Landmarks, index: usize, min_visibility: f32) -> Option<Landmark> {
    landmarks
        .get(index)
        .filter(|lm| lm.visibility >= min_visibility)
}

fn midpoint(a: Landmark, b: Landmark) -> (f32, f32) {
    ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Angle in degrees between vertical and the segment from `lower` to `upper`.
/// Image coordinates grow downward, so an `upper` point below `lower` yields
/// more than 90 degrees.
fn angle_from_vertical(lower: (f32, f32), upper: (f32, f32)) -> f32 {
    let dx = upper.0 - lower.0;
    let dy = lower.1 - upper.1;
    dx.abs().atan2(dy).to_degrees()
}
