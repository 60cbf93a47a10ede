//! Image decoding and the model's input transform.
//!
//! The model takes a 224x224 RGB image scaled into [0, 1], NHWC with a
//! batch dimension of one. Uploads may be PNG, JPEG or Netpbm; grayscale
//! and alpha images are converted to RGB.

use anyhow::{anyhow, bail, Result};
use image::imageops::{self, FilterType};
use image::{ColorType, ImageFormat, ImageReader, Limits};
use serde::Serialize;
use serde_json::Value;
use std::io::Cursor;

pub use image::RgbImage;

/// Side length of the square model input.
pub const INPUT_SIZE: usize = 224;

/// Uploads wider or taller than this are refused before any pixel is read.
pub const MAX_SIDE: u32 = 16_384;

/// Bicubic; the filter support widens with the shrink factor, so large
/// scans are area-averaged rather than point-sampled.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// What the operator is shown about an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    pub format: String,
    pub mode: String,
}

fn format_name(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("PNG"),
        ImageFormat::Jpeg => Some("JPEG"),
        ImageFormat::Pnm => Some("PPM"),
        _ => None,
    }
}

fn mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "other",
    }
}

/// Decodes an upload and converts it to 8-bit RGB.
pub fn decode_image(bytes: &[u8]) -> Result<(RgbImage, ImageInfo)> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| anyhow!("unrecognized image format"))?;
    let format_label = format_name(format)
        .ok_or_else(|| anyhow!("unsupported image format {:?}; use PNG, JPEG or PPM", format))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SIDE);
    limits.max_image_height = Some(MAX_SIDE);
    reader.limits(limits);

    let decoded = reader.decode()?;
    let info = ImageInfo {
        width: decoded.width() as usize,
        height: decoded.height() as usize,
        format: format_label.to_string(),
        mode: mode_name(decoded.color()).to_string(),
    };
    Ok((decoded.to_rgb8(), info))
}

/// Dense f32 tensor in NHWC order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl Tensor {
    /// One batch element as nested `[h][w][c]` arrays.
    pub fn instance_json(&self, index: usize) -> Result<Value> {
        let [n, h, w, c] = self.shape;
        if index >= n {
            bail!("instance {} out of range for batch of {}", index, n);
        }
        let base = index * h * w * c;
        let rows = (0..h)
            .map(|y| {
                Value::Array(
                    (0..w)
                        .map(|x| {
                            let i = base + (y * w + x) * c;
                            Value::Array(
                                self.data[i..i + c]
                                    .iter()
                                    .map(|v| serde_json::json!(v))
                                    .collect(),
                            )
                        })
                        .collect(),
                )
            })
            .collect();
        Ok(Value::Array(rows))
    }
}

/// Scales every channel into [0, 1] without resizing.
pub fn to_tensor(image: &RgbImage) -> Tensor {
    Tensor {
        shape: [1, image.height() as usize, image.width() as usize, 3],
        data: image.as_raw().iter().map(|v| *v as f32 / 255.0).collect(),
    }
}

/// Resize to the model input and scale into [0, 1].
pub fn preprocess(image: &RgbImage) -> Result<Tensor> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        bail!("image has zero size ({}x{})", width, height);
    }
    let side = INPUT_SIZE as u32;
    if (width, height) == (side, side) {
        return Ok(to_tensor(image));
    }
    Ok(to_tensor(&imageops::resize(image, side, side, RESIZE_FILTER)))
}
