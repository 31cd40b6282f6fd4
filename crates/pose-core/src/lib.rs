//! Pose estimation contract and posture classification strategies.
//!
//! Real neural-network backends live outside this workspace; the pipeline
//! consumes them behind [`PoseEstimator`]. Classification is a pluggable
//! single-method strategy behind [`PostureClassifier`].

pub use classify::{
    ClassifierThresholds, PostureClassifier, PostureState, TorsoGeometryClassifier,
};
pub use estimator::{DetectionResult, PoseEstimator};
pub use landmarks::{landmark_index, Landmark, Landmarks};

mod classify;
mod estimator;
mod landmarks;
pub mod synthetic;
