use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;
use std::io::Cursor;

use crate::error::PredictError;

/// Shorter side after the first resize.
pub const RESIZE: u32 = 256;
/// Side of the center crop fed to the network.
pub const CROP: u32 = 224;
/// Model input shape, batch first.
pub const INPUT_SHAPE: [usize; 4] = [1, 3, CROP as usize, CROP as usize];

// ImageNet statistics
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PredictError> {
    // the reader enforces the default decoder allocation limits
    let img = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .decode()?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PredictError::EmptyImage);
    }
    Ok(img)
}

/// Square window, in source pixels, that Resize(256) followed by
/// CenterCrop(224) would keep. Returns `(left, top, side)`.
fn crop_window(width: u32, height: u32) -> Result<(u32, u32, u32), PredictError> {
    let short = width.min(height) as u64;
    let side = (CROP as u64 * short + RESIZE as u64 / 2) / RESIZE as u64;
    let side = u32::try_from(side.max(1)).map_err(|_| {
        PredictError::Preprocess(format!("crop window overflows for {}x{}", width, height))
    })?;

    Ok(((width - side) / 2, (height - side) / 2, side))
}

/// Resize(256), CenterCrop(224), scale to [0, 1], normalize per channel and
/// lay out as `[1, 3, 224, 224]`.
///
/// The crop is taken from the source image before resizing, so memory stays
/// bounded by the decoded image whatever its aspect ratio.
pub fn preprocess(img: &DynamicImage) -> Result<Array4<f32>, PredictError> {
    let (width, height) = img.dimensions();
    let (left, top, side) = crop_window(width, height)?;

    let cropped = img
        .crop_imm(left, top, side, side)
        .resize_exact(CROP, CROP, FilterType::Triangle)
        .to_rgb8();

    Ok(Array4::from_shape_fn(INPUT_SHAPE, |(_, c, y, x)| {
        (cropped[(x as u32, y as u32)][c] as f32 / 255.0 - MEAN[c]) / STD[c]
    }))
}

/// Decodes and preprocesses an uploaded file.
pub fn process_bytes(bytes: &[u8]) -> Result<Array4<f32>, PredictError> {
    let img = decode(bytes)?;
    tracing::debug!(width = img.width(), height = img.height(), "decoded upload");
    preprocess(&img)
}
