//! Native camera backend: `nokhwa` capture, `minifb` window, `rustface`
//! face detection

use minifb::{Key, Window, WindowOptions};
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};

use super::{CameraBackend, Display, FaceBox, FaceDetector, Frame, FrameSource};
use crate::config::CameraConfig;
use crate::{Error, Result};

pub struct NativeCamera {
    config: CameraConfig,
}

impl NativeCamera {
    pub const fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl CameraBackend for NativeCamera {
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(self.config.index), requested)
            .map_err(|e| Error::Camera(format!("failed to open camera {}: {e}", self.config.index)))?;
        camera
            .open_stream()
            .map_err(|e| Error::Camera(format!("failed to start camera stream: {e}")))?;

        tracing::info!(index = self.config.index, "camera opened");
        Ok(Box::new(NokhwaSource {
            camera,
            streaming: true,
        }))
    }

    fn open_display(&mut self, title: &str, width: u32, height: u32) -> Result<Box<dyn Display>> {
        let window = Window::new(
            title,
            width as usize,
            height as usize,
            WindowOptions::default(),
        )
        .map_err(|e| Error::Camera(format!("failed to open window: {e}")))?;

        Ok(Box::new(MinifbDisplay {
            window: Some(window),
            width: width as usize,
            height: height as usize,
        }))
    }

    fn load_detector(&mut self) -> Result<Box<dyn FaceDetector>> {
        let path = self.config.face_model.to_string_lossy();
        let mut detector = rustface::create_detector(&path)
            .map_err(|e| Error::Camera(format!("failed to load face model {path}: {e}")))?;
        detector.set_min_face_size(self.config.min_face_size);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        tracing::debug!(model = %path, "face detector loaded");
        Ok(Box::new(SeetaDetector { detector }))
    }
}

struct NokhwaSource {
    camera: Camera,
    streaming: bool,
}

impl FrameSource for NokhwaSource {
    fn read_frame(&mut self) -> Result<Frame> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| Error::Camera(format!("failed to read frame: {e}")))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::Camera(format!("failed to decode frame: {e}")))?;
        let (width, height) = (image.width(), image.height());
        Frame::new(width, height, image.into_raw())
    }

    fn release(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!(error = %e, "failed to stop camera stream");
        }
    }
}

struct MinifbDisplay {
    window: Option<Window>,
    width: usize,
    height: usize,
}

impl Display for MinifbDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        let window = self
            .window
            .as_mut()
            .ok_or_else(|| Error::Camera("window already closed".to_string()))?;
        window
            .update_with_buffer(&frame.to_argb(), self.width, self.height)
            .map_err(|e| Error::Camera(format!("failed to draw frame: {e}")))
    }

    fn quit_requested(&self) -> bool {
        self.window
            .as_ref()
            .is_none_or(|w| !w.is_open() || w.is_key_down(Key::Q))
    }

    fn close(&mut self) {
        self.window = None;
    }
}

struct SeetaDetector {
    detector: Box<dyn rustface::Detector>,
}

impl FaceDetector for SeetaDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<FaceBox> {
        let gray = frame.to_gray();
        let image = rustface::ImageData::new(&gray, frame.width(), frame.height());

        self.detector
            .detect(&image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                }
            })
            .collect()
    }
}
