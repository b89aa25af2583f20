//! Camera viewer with optional face-box overlay
//!
//! The viewer owns the capture device and window for the length of one
//! session. Both are released on every exit path, including early returns
//! and errors, by [`Session`]'s `Drop`.

#[cfg(feature = "camera")]
mod native;

use crate::config::CameraConfig;
use crate::voice::Speaker;
use crate::{Error, Result};

/// Overlay colour for detected faces
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];

/// Overlay line thickness in pixels
pub const BOX_THICKNESS: u32 = 2;

/// Spoken when the capture device cannot be opened
pub const OPEN_FAILED: &str = "Sorry, I could not open the camera.";

/// Spoken when the face model cannot be loaded
pub const MODEL_FAILED: &str = "Sorry, I could not load the face detection model.";

/// One RGB camera frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl Frame {
    /// Wrap packed RGB bytes
    ///
    /// # Errors
    ///
    /// Returns error if the buffer length does not match the dimensions
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if rgb.len() != expected {
            return Err(Error::Camera(format!(
                "frame buffer has {} bytes, expected {expected} for {width}x{height}",
                rgb.len()
            )));
        }
        Ok(Self { width, height, rgb })
    }

    /// Solid-colour frame
    #[must_use]
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let pixels = (width as usize) * (height as usize);
        Self {
            width,
            height,
            rgb: color.repeat(pixels),
        }
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Colour at `(x, y)`, `None` outside the frame
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 3;
        Some([self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]])
    }

    /// Luma plane (ITU-R BT.601 weights) for the face detector
    #[must_use]
    pub fn to_gray(&self) -> Vec<u8> {
        self.rgb
            .chunks_exact(3)
            .map(|p| {
                let luma =
                    (77 * u32::from(p[0]) + 150 * u32::from(p[1]) + 29 * u32::from(p[2])) >> 8;
                u8::try_from(luma).unwrap_or(u8::MAX)
            })
            .collect()
    }

    /// Packed `0RGB` pixels for the display window
    #[must_use]
    pub fn to_argb(&self) -> Vec<u32> {
        self.rgb
            .chunks_exact(3)
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2]))
            .collect()
    }

    /// Draw a rectangle outline, clipped to the frame
    ///
    /// The outline grows inward from the box edges.
    pub fn draw_rect(&mut self, face: FaceBox, color: [u8; 3], thickness: u32) {
        if face.width == 0 || face.height == 0 {
            return;
        }

        let left = i64::from(face.x);
        let top = i64::from(face.y);
        let right = left + i64::from(face.width) - 1;
        let bottom = top + i64::from(face.height) - 1;

        for t in 0..i64::from(thickness) {
            for x in left..=right {
                self.set_pixel(x, top + t, color);
                self.set_pixel(x, bottom - t, color);
            }
            for y in top..=bottom {
                self.set_pixel(left + t, y, color);
                self.set_pixel(right - t, y, color);
            }
        }
    }

    fn set_pixel(&mut self, x: i64, y: i64, color: [u8; 3]) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if x >= self.width || y >= self.height {
            return;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 3;
        self.rgb[i..i + 3].copy_from_slice(&color);
    }
}

/// Bounding box of a detected face, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Viewer flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMode {
    /// Live feed only
    Plain,
    /// Live feed with face boxes
    Detection,
}

impl ViewerMode {
    #[must_use]
    pub const fn window_title(self) -> &'static str {
        match self {
            Self::Plain => "Camera Feed - Press Q to close",
            Self::Detection => "Face Detection - Press Q to close",
        }
    }

    /// Spoken once the camera is open
    #[must_use]
    pub const fn opening_line(self) -> &'static str {
        match self {
            Self::Plain => "Camera feed is live. Press Q to close the window.",
            Self::Detection => "Opening face detection camera. Press Q to close.",
        }
    }

    /// Spoken after the session ends
    #[must_use]
    pub const fn closing_line(self) -> &'static str {
        match self {
            Self::Plain => "Camera closed.",
            Self::Detection => "Face detection camera closed.",
        }
    }
}

/// An open capture device
pub trait FrameSource {
    /// Read the next frame
    ///
    /// # Errors
    ///
    /// Returns error when the device stops delivering frames
    fn read_frame(&mut self) -> Result<Frame>;

    /// Stop capturing and free the device; must tolerate repeat calls
    fn release(&mut self);
}

/// A window showing frames
pub trait Display {
    /// Render `frame`
    ///
    /// # Errors
    ///
    /// Returns error if the window cannot be updated
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// True once the user pressed `q` or closed the window
    fn quit_requested(&self) -> bool;

    /// Close the window; must tolerate repeat calls
    fn close(&mut self);
}

/// Finds faces in a frame
pub trait FaceDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<FaceBox>;
}

/// Factory for the camera session's resources
pub trait CameraBackend {
    /// Open the capture device
    ///
    /// # Errors
    ///
    /// Returns error if the device is missing or busy
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>>;

    /// Open a display window sized for the first frame
    ///
    /// # Errors
    ///
    /// Returns error if no window can be created
    fn open_display(&mut self, title: &str, width: u32, height: u32) -> Result<Box<dyn Display>>;

    /// Load the face detection model
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be loaded
    fn load_detector(&mut self) -> Result<Box<dyn FaceDetector>>;
}

/// Scoped ownership of the capture device and window
struct Session {
    source: Box<dyn FrameSource>,
    display: Option<Box<dyn Display>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.source.release();
        if let Some(display) = self.display.as_mut() {
            display.close();
        }
        tracing::debug!("camera session released");
    }
}

/// Run one camera session until the user quits or frames stop
///
/// Failures to open the camera or load the face model are spoken and the
/// call returns without a session; they are not errors for the caller.
///
/// # Errors
///
/// Returns error only if speaking fails
pub fn run_viewer(
    backend: &mut dyn CameraBackend,
    mode: ViewerMode,
    speaker: &mut dyn Speaker,
) -> Result<()> {
    let source = match backend.open_source() {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "camera unavailable");
            return speaker.speak(OPEN_FAILED);
        }
    };

    let mut session = Session {
        source,
        display: None,
    };

    let mut detector = match mode {
        ViewerMode::Plain => None,
        ViewerMode::Detection => match backend.load_detector() {
            Ok(detector) => Some(detector),
            Err(e) => {
                tracing::error!(error = %e, "face model unavailable");
                drop(session);
                return speaker.speak(MODEL_FAILED);
            }
        },
    };

    speaker.speak(mode.opening_line())?;
    tracing::info!(?mode, "camera session started");

    let mut frames: u64 = 0;
    loop {
        let mut frame = match session.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "camera stopped delivering frames");
                break;
            }
        };

        if let Some(detector) = detector.as_mut() {
            let faces = detector.detect(&frame);
            tracing::trace!(faces = faces.len(), "faces detected");
            for face in faces {
                frame.draw_rect(face, BOX_COLOR, BOX_THICKNESS);
            }
        }

        if session.display.is_none() {
            match backend.open_display(mode.window_title(), frame.width(), frame.height()) {
                Ok(display) => session.display = Some(display),
                Err(e) => {
                    tracing::error!(error = %e, "failed to open camera window");
                    break;
                }
            }
        }

        let Some(display) = session.display.as_mut() else {
            break;
        };
        if let Err(e) = display.show(&frame) {
            tracing::warn!(error = %e, "failed to render frame");
            break;
        }
        frames += 1;

        if display.quit_requested() {
            break;
        }
    }

    drop(session);
    tracing::info!(?mode, frames, "camera session ended");
    speaker.speak(mode.closing_line())
}

/// Backend used when the crate is built without camera support
pub struct UnavailableCamera;

impl CameraBackend for UnavailableCamera {
    fn open_source(&mut self) -> Result<Box<dyn FrameSource>> {
        Err(Error::Camera("built without camera support".to_string()))
    }

    fn open_display(&mut self, _title: &str, _width: u32, _height: u32) -> Result<Box<dyn Display>> {
        Err(Error::Camera("built without camera support".to_string()))
    }

    fn load_detector(&mut self) -> Result<Box<dyn FaceDetector>> {
        Err(Error::Camera("built without camera support".to_string()))
    }
}

/// The platform camera backend for this build
#[must_use]
pub fn system_camera(config: &CameraConfig) -> Box<dyn CameraBackend> {
    #[cfg(feature = "camera")]
    {
        Box::new(native::NativeCamera::new(config.clone()))
    }

    #[cfg(not(feature = "camera"))]
    {
        tracing::debug!(index = config.index, "camera support not compiled in");
        Box::new(UnavailableCamera)
    }
}
