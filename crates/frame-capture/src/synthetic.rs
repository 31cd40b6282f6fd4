//! Deterministic frame source for demos and unattended tests.

use chrono::Utc;
use tracing::debug;

use crate::{CaptureError, Frame, FrameFormat, FrameSource};

/// Generates a rolling gradient pattern at a fixed geometry.
///
/// Frames are produced as fast as the caller reads them; pacing belongs to the
/// pipeline's frame-budget throttle, not the source.
pub struct SyntheticSource {
    width: i32,
    height: i32,
    opened: bool,
    frame_counter: u64,
}

impl SyntheticSource {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            opened: false,
            frame_counter: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> bool {
        debug!("synthetic source opened ({}x{})", self.width, self.height);
        self.opened = true;
        true
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        if !self.opened {
            return Err(CaptureError::NotOpen);
        }
        self.frame_counter = self.frame_counter.wrapping_add(1);
        let len = (self.width * self.height * 3) as usize;
        let shift = self.frame_counter.wrapping_mul(7);
        let mut data = vec![0u8; len];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = ((i as u64).wrapping_add(shift) % 251) as u8;
        }
        Ok(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        })
    }

    fn release(&mut self) {
        self.opened = false;
    }
}
