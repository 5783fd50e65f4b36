//! Mask-based image cleaning.
//!
//! The uploaded image and mask are decoded in memory, the mask is reduced to
//! a binary selection and the selected pixels are reconstructed by an
//! [`InpaintModel`]. The result is encoded as PNG.

pub mod config;
mod diffusion;
pub mod model;
mod raster;
pub mod strategy;
mod telea;

pub use config::{HdStrategy, InpaintConfig, Sampler, CLEANING_CONFIG};
pub use diffusion::DiffusionModel;
pub use model::{InpaintModel, ModelKind, UnknownModel};
pub use raster::{is_masked, MASK_THRESHOLD};
pub use telea::TeleaModel;

use crate::error::{ConversionError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use std::io::Cursor;

/// Decode an uploaded image, sniffing the format from its contents.
pub fn decode_image(bytes: &[u8], field: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| ConversionError::Decode(format!("{field} is not a decodable image: {e}")))
}

/// Reduce a mask to 0/255 at `width` x `height`.
///
/// Masks of a different size are stretched with nearest-neighbour sampling.
pub fn binarize_mask(mask: &DynamicImage, width: u32, height: u32) -> GrayImage {
    let mut gray = mask.to_luma8();
    if gray.dimensions() != (width, height) {
        tracing::warn!(
            "Mask is {}x{}, image is {}x{}; resizing mask",
            gray.width(),
            gray.height(),
            width,
            height
        );
        gray = imageops::resize(&gray, width, height, FilterType::Nearest);
    }
    for px in gray.pixels_mut() {
        *px = Luma([if is_masked(px[0]) { 255 } else { 0 }]);
    }
    gray
}

/// Encode as PNG into memory.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| ConversionError::Encode(format!("failed to encode PNG: {e}")))?;
    Ok(buffer.into_inner())
}

/// Inpaint the masked area of `image`, returning the full-size result.
///
/// An alpha channel, if present, is carried over unchanged.
pub fn clean(
    image: &DynamicImage,
    mask: &DynamicImage,
    model: &dyn InpaintModel,
    config: &InpaintConfig,
) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    let mask = binarize_mask(mask, width, height);
    let rgb = image.to_rgb8();

    let selected = mask.pixels().filter(|p| p[0] > 0).count();
    let filled = if selected == 0 {
        tracing::debug!("Empty mask, returning image unchanged");
        rgb
    } else {
        tracing::debug!(
            "Inpainting {} of {} pixels with '{}'",
            selected,
            width as u64 * height as u64,
            model.name()
        );
        strategy::run(model, &rgb, &mask, config)?
    };

    if image.color().has_alpha() {
        let alpha = image.to_rgba8();
        let rgba = RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = filled.get_pixel(x, y).0;
            Rgba([r, g, b, alpha.get_pixel(x, y)[3]])
        });
        Ok(DynamicImage::ImageRgba8(rgba))
    } else {
        Ok(DynamicImage::ImageRgb8(filled))
    }
}

/// Decode, clean and re-encode an uploaded image/mask pair.
pub fn clean_image(
    image_bytes: &[u8],
    mask_bytes: &[u8],
    model: &dyn InpaintModel,
    config: &InpaintConfig,
) -> Result<Vec<u8>> {
    let image = decode_image(image_bytes, "image")?;
    let mask = decode_image(mask_bytes, "mask")?;
    let cleaned = clean(&image, &mask, model, config)?;
    encode_png(&cleaned)
}
