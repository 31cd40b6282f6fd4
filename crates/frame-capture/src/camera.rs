//! OpenCV-backed camera source and JPEG encoder.

use chrono::Utc;
use opencv::{
    core::{self, MatTraitConstManual, Vector},
    imgcodecs, imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::{debug, warn};

use crate::{CaptureError, Frame, FrameEncoder, FrameFormat, FrameSource};

/// V4L camera wrapper implementing the pull-based source contract.
///
/// Device index and capture geometry are fixed at construction; `open` may be
/// called again after a `release` to reacquire the same device.
pub struct CameraSource {
    device_index: i32,
    target_size: (i32, i32),
    fps: f64,
    capture: Option<VideoCapture>,
}

impl CameraSource {
    pub fn new(device_index: i32, target_size: (i32, i32), fps: f64) -> Self {
        Self {
            device_index,
            target_size,
            fps,
            capture: None,
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> bool {
        self.release();
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match VideoCapture::new(self.device_index, backend) {
                Ok(mut cap) => match cap.is_opened() {
                    Ok(true) => {
                        configure_capture(&mut cap, self.target_size, self.fps);
                        debug!(
                            "opened camera #{} ({}x{} @ {} fps requested)",
                            self.device_index, self.target_size.0, self.target_size.1, self.fps
                        );
                        self.capture = Some(cap);
                        return true;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(
                            "probing camera #{} with backend {backend} failed: {err}",
                            self.device_index
                        );
                    }
                },
                Err(err) => {
                    warn!(
                        "failed to open camera #{} with backend {backend}: {err}",
                        self.device_index
                    );
                }
            }
        }
        warn!("unable to open camera #{}", self.device_index);
        false
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let cap = self.capture.as_mut().ok_or(CaptureError::NotOpen)?;

        let mut raw = Mat::default();
        let grabbed = cap
            .read(&mut raw)
            .map_err(|e| CaptureError::Other(e.into()))?;
        if !grabbed {
            return Err(CaptureError::ReadFailed);
        }

        let size = raw.size().map_err(|e| CaptureError::Other(e.into()))?;
        if size.width <= 0 || size.height <= 0 {
            return Err(CaptureError::EmptyFrame);
        }

        let (target_w, target_h) = self.target_size;
        let mut scratch = Mat::default();
        let working = if size.width != target_w || size.height != target_h {
            imgproc::resize(
                &raw,
                &mut scratch,
                core::Size {
                    width: target_w,
                    height: target_h,
                },
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )
            .map_err(|e| CaptureError::Other(e.into()))?;
            &scratch
        } else {
            &raw
        };

        let data = working
            .data_bytes()
            .map_err(|e| CaptureError::Other(e.into()))?
            .to_vec();

        Ok(Frame {
            data,
            width: target_w,
            height: target_h,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Bgr8,
        })
    }

    fn release(&mut self) {
        if let Some(mut cap) = self.capture.take() {
            if let Err(err) = cap.release() {
                warn!("releasing camera #{} failed: {err}", self.device_index);
            }
        }
    }
}

/// Apply common capture settings (pixel format, resolution, fps).
fn configure_capture(cap: &mut VideoCapture, target_size: (i32, i32), fps: f64) {
    let mut fourcc_set = false;
    if let Ok(mjpg) = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G') {
        if matches!(cap.set(videoio::CAP_PROP_FOURCC, mjpg as f64), Ok(true)) {
            fourcc_set = true;
        }
    }
    if !fourcc_set {
        if let Ok(yuyv) = videoio::VideoWriter::fourcc('Y', 'U', 'Y', 'V') {
            let _ = cap.set(videoio::CAP_PROP_FOURCC, yuyv as f64);
        }
    }
    let _ = cap.set(videoio::CAP_PROP_FRAME_WIDTH, target_size.0 as f64);
    let _ = cap.set(videoio::CAP_PROP_FRAME_HEIGHT, target_size.1 as f64);
    let _ = cap.set(videoio::CAP_PROP_FPS, fps);
}

/// JPEG encoder for frames published through the result slot.
pub struct JpegEncoder {
    quality: i32,
}

impl JpegEncoder {
    pub fn new(quality: i32) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&mut self, frame: &Frame) -> anyhow::Result<Vec<u8>> {
        let mat = Mat::from_slice(&frame.data)?;
        let mat = mat.reshape(3, frame.height)?;
        let mut buf = Vector::<u8>::new();
        let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, self.quality]);
        imgcodecs::imencode(".jpg", &mat, &mut buf, &params)?;
        Ok(buf.to_vec())
    }
}
