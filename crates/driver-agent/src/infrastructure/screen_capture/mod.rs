//! Screen capture collaborator and frame compression.
//!
//! [`ScreenCapture`] hands out raw RGBA frames; [`FrameEncoder`] turns them
//! into JPEG for the stream (resized to the channel dimensions, fixed
//! quality) and into PNG or JPEG at native size for the screenshot route.

pub mod simulated;

use image::{
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
    imageops::FilterType,
    ColorType, DynamicImage, ImageEncoder, RgbaImage,
};
use thiserror::Error;

/// Default JPEG quality factor of the stream.
pub const DEFAULT_JPEG_QUALITY: u8 = 60;

/// One uncompressed screen frame, 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Source of screen frames.
///
/// Capture is treated as read-only with respect to the automation target and
/// may run concurrently with commands.  `None` means no frame is available
/// right now; callers skip and try again on the next request.
#[cfg_attr(test, mockall::automock)]
pub trait ScreenCapture: Send + Sync {
    fn capture(&self) -> Option<RawFrame>;
}

/// Error type for frame compression.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The RGBA buffer does not match `width * height * 4`.
    #[error("frame buffer of {len} bytes does not match {width}x{height} RGBA")]
    BadBuffer { width: u32, height: u32, len: usize },

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Compressed output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

/// Compresses raw frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEncoder {
    quality: u8,
    channel_width: u32,
    channel_height: u32,
}

impl FrameEncoder {
    /// Creates an encoder producing stream frames of `channel_width` x
    /// `channel_height`.  `quality` is clamped to `1..=100`.
    pub fn new(quality: u8, channel_width: u32, channel_height: u32) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            channel_width: channel_width.max(1),
            channel_height: channel_height.max(1),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encodes one stream frame: resized to the channel size, then JPEG.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] for a malformed buffer or an encoder failure.
    pub fn encode_stream_frame(&self, frame: &RawFrame) -> Result<Vec<u8>, EncodeError> {
        let mut image = to_image(frame)?;
        if image.width() != self.channel_width || image.height() != self.channel_height {
            image = image::imageops::resize(
                &image,
                self.channel_width,
                self.channel_height,
                FilterType::Triangle,
            );
        }
        self.jpeg(&image)
    }

    /// Encodes a frame at its native size.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] for a malformed buffer or an encoder failure.
    pub fn encode_native(&self, frame: &RawFrame, kind: ImageKind) -> Result<Vec<u8>, EncodeError> {
        let image = to_image(frame)?;
        match kind {
            ImageKind::Jpeg => self.jpeg(&image),
            ImageKind::Png => {
                let mut bytes = Vec::new();
                PngEncoder::new(&mut bytes).write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    ColorType::Rgba8,
                )?;
                Ok(bytes)
            }
        }
    }

    fn jpeg(&self, image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ColorType::Rgb8,
        )?;
        Ok(bytes)
    }
}

fn to_image(frame: &RawFrame) -> Result<RgbaImage, EncodeError> {
    RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or(
        EncodeError::BadBuffer {
            width: frame.width,
            height: frame.height,
            len: frame.rgba.len(),
        },
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> RawFrame {
        RawFrame {
            width,
            height,
            rgba: [200u8, 40, 90, 255].repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(FrameEncoder::new(0, 10, 10).quality(), 1);
        assert_eq!(FrameEncoder::new(250, 10, 10).quality(), 100);
        assert_eq!(FrameEncoder::new(DEFAULT_JPEG_QUALITY, 10, 10).quality(), 60);
    }

    #[test]
    fn test_stream_frame_is_jpeg_at_channel_size() {
        // Arrange
        let encoder = FrameEncoder::new(60, 30, 20);

        // Act
        let bytes = encoder.encode_stream_frame(&solid_frame(90, 60)).expect("encode");

        // Assert
        assert_eq!(&bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (30, 20));
    }

    #[test]
    fn test_native_png_keeps_size() {
        let encoder = FrameEncoder::new(60, 30, 20);

        let bytes = encoder
            .encode_native(&solid_frame(90, 60), ImageKind::Png)
            .expect("encode");

        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (90, 60));
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let encoder = FrameEncoder::new(60, 10, 10);
        let frame = RawFrame {
            width: 10,
            height: 10,
            rgba: vec![0; 12],
        };

        assert!(matches!(
            encoder.encode_stream_frame(&frame),
            Err(EncodeError::BadBuffer { len: 12, .. })
        ));
    }

    #[test]
    fn test_mock_capture_can_report_no_frame() {
        let mut capture = MockScreenCapture::new();
        capture.expect_capture().times(1).returning(|| None);

        assert_eq!(capture.capture(), None);
    }
}
