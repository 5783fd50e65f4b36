//! Feeding large images to a model.
//!
//! Whatever the strategy, the final composite only takes masked pixels from
//! the model output; everything else is copied from the input untouched.

use super::config::{HdStrategy, InpaintConfig};
use super::model::InpaintModel;
use super::raster::is_masked;
use crate::error::Result;
use image::imageops::{self, FilterType};
use image::{GenericImageView, GrayImage, Luma, RgbImage};

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Grow by `margin` on every side, clamped to a `width` x `height` image.
    pub fn expand(&self, margin: u32, width: u32, height: u32) -> Region {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = (self.x + self.width).saturating_add(margin).min(width);
        let y1 = (self.y + self.height).saturating_add(margin).min(height);
        Region {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

/// Bounding boxes of the 8-connected masked areas, in scan order.
pub fn mask_regions(mask: &GrayImage) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut visited = vec![false; w * h];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] || !is_masked(mask.as_raw()[start]) {
            continue;
        }
        visited[start] = true;
        stack.push(start);
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (usize::MAX, usize::MAX, 0, 0);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if !visited[n] && is_masked(mask.as_raw()[n]) {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        regions.push(Region {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        });
    }

    regions
}

/// Take masked pixels from `filled`, everything else from `original`.
pub fn composite(original: &RgbImage, filled: &RgbImage, mask: &GrayImage) -> RgbImage {
    let mut out = original.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        if is_masked(mask.get_pixel(x, y)[0]) {
            *px = *filled.get_pixel(x, y);
        }
    }
    out
}

fn scaled(width: u32, height: u32, limit: u32) -> (u32, u32) {
    let scale = limit as f64 / width.max(height) as f64;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// Run `model` over `image` according to `config.hd_strategy`.
pub fn run(
    model: &dyn InpaintModel,
    image: &RgbImage,
    mask: &GrayImage,
    config: &InpaintConfig,
) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    let longer = width.max(height);

    let filled = match config.hd_strategy {
        HdStrategy::Crop if longer > config.crop_trigger_size => {
            let regions = mask_regions(mask);
            tracing::debug!(
                "Crop strategy: {} regions in {}x{} image",
                regions.len(),
                width,
                height
            );
            let mut result = image.clone();
            for region in regions {
                let b = region.expand(config.crop_margin, width, height);
                let crop_image = image.view(b.x, b.y, b.width, b.height).to_image();
                let crop_mask = mask.view(b.x, b.y, b.width, b.height).to_image();
                let crop_filled = model.inpaint(&crop_image, &crop_mask, config)?;
                for (x, y, px) in crop_filled.enumerate_pixels() {
                    if is_masked(crop_mask.get_pixel(x, y)[0]) {
                        result.put_pixel(b.x + x, b.y + y, *px);
                    }
                }
            }
            result
        }
        HdStrategy::Resize if longer > config.resize_limit => {
            let (w, h) = scaled(width, height, config.resize_limit);
            tracing::debug!("Resize strategy: {}x{} -> {}x{}", width, height, w, h);
            let small_image = imageops::resize(image, w, h, FilterType::CatmullRom);
            // Any coverage after averaging keeps the pixel selected
            let mut small_mask = imageops::resize(mask, w, h, FilterType::Triangle);
            for px in small_mask.pixels_mut() {
                *px = Luma([if px[0] > 0 { 255 } else { 0 }]);
            }
            let small_filled = model.inpaint(&small_image, &small_mask, config)?;
            imageops::resize(&small_filled, width, height, FilterType::CatmullRom)
        }
        _ => model.inpaint(image, mask, config)?,
    };

    Ok(composite(image, &filled, mask))
}
