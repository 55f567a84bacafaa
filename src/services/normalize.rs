use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// Crop to the top-left square of side `min(w, h)` and resize to `size`×`size`.
///
/// No aspect-ratio preservation and no padding; the same bytes always yield
/// the same image.
pub fn normalize(image: &DynamicImage, size: u32) -> RgbImage {
    let side = image.width().min(image.height());
    image
        .crop_imm(0, 0, side, side)
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8()
}

/// Decode arbitrary image bytes and normalize them.
pub fn decode_and_normalize(bytes: &[u8], size: u32) -> Result<RgbImage, NormalizeError> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(NormalizeError::Empty);
    }
    Ok(normalize(&image, size))
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, NormalizeError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("image has no pixels")]
    Empty,
}
