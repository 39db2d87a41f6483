// Frame source backed by an OpenCV `VideoCapture`: a camera index, a video
// file, a stream URL or a GStreamer pipeline.

use crate::convert::bgr_to_frame;
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use red_light_vision::{Frame, FrameSource, GameError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Camera(i32),
    /// Anything `VideoCapture` can open by name.
    Location(String),
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i32>() {
            Ok(index) => SourceSpec::Camera(index),
            Err(_) => SourceSpec::Location(raw.to_owned()),
        }
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Camera(index) => write!(f, "camera {index}"),
            SourceSpec::Location(location) => f.write_str(location),
        }
    }
}

pub struct CameraSource {
    spec: SourceSpec,
    capture: Option<VideoCapture>,
    frame: Mat,
}

impl CameraSource {
    pub fn new(spec: SourceSpec) -> Self {
        Self {
            spec,
            capture: None,
            frame: Mat::default(),
        }
    }

    fn open_capture(&self) -> opencv::Result<VideoCapture> {
        let api = VideoCaptureAPIs::CAP_ANY as i32;
        match &self.spec {
            SourceSpec::Camera(index) => VideoCapture::new(*index, api),
            SourceSpec::Location(location) => VideoCapture::from_file(location, api),
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> red_light_vision::Result<()> {
        let unavailable =
            |reason: String| GameError::SourceUnavailable(format!("{}: {reason}", self.spec));
        let mut capture = self.open_capture().map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("not opened".into()));
        }
        // Keep only the newest frame so red light judges what is happening now.
        if let Err(e) = capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0) {
            debug!(error = %e, "capture buffer size not supported");
        }
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or_default();
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or_default();
        info!(source = %self.spec, width, height, "capture opened");
        self.capture = Some(capture);
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let capture = self.capture.as_mut()?;
        match capture.read(&mut self.frame) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!(error = %e, "frame read failed");
                return None;
            }
        }
        match bgr_to_frame(&self.frame) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "frame conversion failed");
                None
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!(error = %e, "failed to release capture");
            }
            info!(source = %self.spec, "capture released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_source_is_a_camera_index() {
        assert_eq!(SourceSpec::parse("0"), SourceSpec::Camera(0));
        assert_eq!(SourceSpec::parse("2"), SourceSpec::Camera(2));
        assert_eq!(
            SourceSpec::parse("rtsp://10.0.0.5/stream"),
            SourceSpec::Location("rtsp://10.0.0.5/stream".into())
        );
    }
}
