//! Frame acquisition layer for the posture monitor.
//!
//! Exposes the pull-based [`FrameSource`] contract the pipeline owns for its
//! whole lifetime, the [`FrameEncoder`] contract used to prepare frames for
//! presentation consumers, and two sources: an OpenCV camera behind the
//! `opencv-backend` feature and a deterministic synthetic generator.

pub use types::{CaptureError, Frame, FrameFormat};

#[cfg(feature = "opencv-backend")]
pub mod camera;
pub mod synthetic;
mod types;

/// Pull-based video source exclusively owned by the monitoring pipeline.
///
/// The pipeline opens the source in `start()`, reads it once per iteration,
/// and releases it in `stop()`. `read` is the only call allowed to block.
pub trait FrameSource: Send {
    /// Acquire the underlying device. Returns `false` when the device cannot
    /// be opened; the failure is logged by the implementation.
    fn open(&mut self) -> bool;

    /// Block until the next frame is available.
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Release the device handle. Safe to call repeatedly, and before `open`.
    fn release(&mut self);
}

/// Encodes a raw frame into a transport format for presentation consumers.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &Frame) -> anyhow::Result<Vec<u8>>;
}
