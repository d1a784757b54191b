use opencv::{
    core::Size,
    imgproc::INTER_LINEAR,
    prelude::*,
    videoio::{CAP_ANY, VideoCapture},
};

use crate::app::{DetectSettings, PickError};

/// Anything that can hand out frames one at a time
pub trait FrameSource {
    /// A failed read is terminal for the caller
    fn next_frame(&mut self) -> Result<Mat, PickError>;
}

/// Owns the capture device; it is released when this is dropped
pub struct Camera {
    cam: VideoCapture,
    index: i32,
    size: Size,
}

impl Camera {
    pub fn open(settings: &DetectSettings) -> Result<Self, PickError> {
        log::info!("Starting video capture on camera {}", settings.camera);
        let cam = VideoCapture::new(settings.camera, CAP_ANY).map_err(|e| {
            PickError::DeviceUnavailable(format!("Camera {}: {}", settings.camera, e))
        })?;
        if !cam.is_opened().unwrap_or(false) {
            return Err(PickError::DeviceUnavailable(format!(
                "Camera {} failed to open",
                settings.camera
            )));
        }
        log::debug!("Video capture opened");

        Ok(Self {
            cam,
            index: settings.camera,
            size: Size::new(settings.frame_width, settings.frame_height),
        })
    }
}

impl FrameSource for Camera {
    fn next_frame(&mut self) -> Result<Mat, PickError> {
        let mut input_frame = Mat::default();
        let ok = self
            .cam
            .read(&mut input_frame)
            .map_err(|e| PickError::DeviceUnavailable(format!("Camera {}: {}", self.index, e)))?;
        if !ok || input_frame.empty() {
            return Err(PickError::DeviceUnavailable(format!(
                "Camera {}: failed to grab frame",
                self.index
            )));
        }

        let mut frame = Mat::default();
        opencv::imgproc::resize(&input_frame, &mut frame, self.size, 0.0, 0.0, INTER_LINEAR)?;
        Ok(frame)
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        match self.cam.release() {
            Ok(_) => log::debug!("Camera {} released", self.index),
            Err(e) => log::error!("Failed to release camera {}: {}", self.index, e),
        }
    }
}
