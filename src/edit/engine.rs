//! Decode, apply edit operations, re-encode.
//!
//! All operations of a request are applied in order to one RGBA buffer
//! decoded from the stored bytes. The output format follows the filename's
//! extension, falling back to whatever format the input was sniffed as, so
//! an edited file keeps the type its name advertises.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader, RgbaImage};

use super::request::{DrawOp, EditOp};
use super::text::draw_text;
use crate::error::EditError;

/// Default JPEG quality used when re-encoding edited images.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Applies edit operations to encoded image bytes.
///
/// Stateless apart from encoder settings; the same input and operations
/// always produce the same output bytes.
#[derive(Debug, Clone)]
pub struct EditEngine {
    jpeg_quality: u8,
}

impl Default for EditEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EditEngine {
    pub fn new() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Use a specific JPEG quality (clamped to 1-100).
    pub fn with_jpeg_quality(quality: u8) -> Self {
        Self {
            jpeg_quality: quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    /// Decode `source`, apply `ops` in order, and encode the result in the
    /// format implied by `filename`.
    pub fn apply(&self, source: &[u8], filename: &str, ops: &[EditOp]) -> Result<Vec<u8>, EditError> {
        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| EditError::Decode {
                message: e.to_string(),
            })?;
        let input_format = reader.format();

        let mut canvas = reader
            .decode()
            .map_err(|e| EditError::Decode {
                message: e.to_string(),
            })?
            .to_rgba8();

        for op in ops {
            apply_op(&mut canvas, op);
        }

        let format = ImageFormat::from_path(filename)
            .ok()
            .or(input_format)
            .ok_or_else(|| EditError::Encode {
                message: format!("cannot determine output format for {}", filename),
            })?;

        self.encode(canvas, format)
    }

    fn encode(&self, canvas: RgbaImage, format: ImageFormat) -> Result<Vec<u8>, EditError> {
        let encode_error = |e: image::ImageError| EditError::Encode {
            message: e.to_string(),
        };
        let image = DynamicImage::ImageRgba8(canvas);

        match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => {
                let mut output = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality);
                encoder.encode_image(&image.to_rgb8()).map_err(encode_error)?;
                Ok(output)
            }
            other => {
                let mut output = Cursor::new(Vec::new());
                image.write_to(&mut output, other).map_err(encode_error)?;
                Ok(output.into_inner())
            }
        }
    }
}

fn apply_op(canvas: &mut RgbaImage, op: &EditOp) {
    match op {
        EditOp::Text(text) => draw_text(canvas, &text.text, text.x, text.y),
        EditOp::Draw(draw) => draw_points(canvas, draw),
    }
}

/// Set each fully specified, in-bounds point to the op's color.
fn draw_points(canvas: &mut RgbaImage, draw: &DrawOp) {
    let (width, height) = canvas.dimensions();

    for (x, y) in draw.points.iter().filter_map(|p| p.coords()) {
        if (0..width as i64).contains(&x) && (0..height as i64).contains(&y) {
            canvas.put_pixel(x as u32, y as u32, draw.color);
        }
    }
}
