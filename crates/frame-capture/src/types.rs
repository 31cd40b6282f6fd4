use anyhow::Error;
use thiserror::Error;

/// Raw BGR frame captured from a video source.
///
/// Owned by the pipeline for one loop iteration and discarded after use.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Bgr8,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video device #{index}")]
    Open { index: i32 },
    #[error("video source is not open")]
    NotOpen,
    #[error("read from video source failed")]
    ReadFailed,
    #[error("video source produced an empty frame")]
    EmptyFrame,
    #[error(transparent)]
    Other(#[from] Error),
}
