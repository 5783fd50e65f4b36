//! Harmonic (membrane) inpainting.
//!
//! Masked pixels relax towards the average of their neighbours until the
//! hole is a smooth interpolation of its border. Plain relaxation converges
//! slowly on large holes, so the `Pyramid` sampler solves a downscaled copy
//! first and uses it as the starting point for each finer level.

use super::config::{InpaintConfig, Sampler};
use super::model::InpaintModel;
use super::raster::Canvas;
use crate::error::{ConversionError, Result};
use image::{GrayImage, RgbImage};

/// Levels smaller than this are solved directly.
const MIN_LEVEL_SIZE: usize = 8;

/// Extra relaxation at the coarsest level and for single-scale runs.
const BASE_STEP_FACTOR: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct DiffusionModel;

impl InpaintModel for DiffusionModel {
    fn name(&self) -> &'static str {
        "diffusion"
    }

    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, config: &InpaintConfig) -> Result<RgbImage> {
        let mut canvas = Canvas::new(image, mask);
        let unknown = canvas.unknown_count();
        if unknown == 0 {
            return Ok(image.clone());
        }
        if unknown == canvas.len() {
            return Err(ConversionError::Inference(
                "mask covers the whole image, nothing to sample from".to_string(),
            ));
        }

        let steps = config.steps.max(1);
        match config.sampler {
            Sampler::Jacobi => {
                seed(&mut canvas);
                relax(&mut canvas, steps * BASE_STEP_FACTOR);
            }
            Sampler::Pyramid => pyramid(&mut canvas, steps),
        }
        Ok(canvas.into_image())
    }
}

/// Start every unknown pixel at the mean colour of the hole's border.
fn seed(canvas: &mut Canvas) {
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for idx in 0..canvas.len() {
        if !canvas.unknown[idx] && canvas.neighbours(idx).any(|n| canvas.unknown[n]) {
            for c in 0..3 {
                sum[c] += canvas.pixels[idx][c] as f64;
            }
            count += 1;
        }
    }
    if count == 0 {
        return;
    }
    let mean = sum.map(|s| (s / count as f64) as f32);
    for idx in 0..canvas.len() {
        if canvas.unknown[idx] {
            canvas.pixels[idx] = mean;
        }
    }
}

/// Jacobi iterations over the unknown pixels only.
fn relax(canvas: &mut Canvas, iterations: u32) {
    let holes: Vec<usize> = (0..canvas.len()).filter(|&i| canvas.unknown[i]).collect();
    if holes.is_empty() {
        return;
    }

    let mut next = vec![[0.0f32; 3]; holes.len()];
    for _ in 0..iterations {
        for (slot, &idx) in next.iter_mut().zip(&holes) {
            let mut sum = [0.0f32; 3];
            let mut count = 0.0f32;
            for n in canvas.neighbours(idx) {
                for c in 0..3 {
                    sum[c] += canvas.pixels[n][c];
                }
                count += 1.0;
            }
            *slot = sum.map(|s| s / count);
        }
        for (value, &idx) in next.iter().zip(&holes) {
            canvas.pixels[idx] = *value;
        }
    }
}

/// Half-resolution copy. A coarse pixel is known when any of its children is,
/// and takes the mean of its known children.
fn downsample(canvas: &Canvas) -> Canvas {
    let width = canvas.width.div_ceil(2);
    let height = canvas.height.div_ceil(2);
    let mut pixels = vec![[0.0f32; 3]; width * height];
    let mut unknown = vec![true; width * height];

    for cy in 0..height {
        for cx in 0..width {
            let mut sum = [0.0f32; 3];
            let mut count = 0.0f32;
            for y in (cy * 2)..(cy * 2 + 2).min(canvas.height) {
                for x in (cx * 2)..(cx * 2 + 2).min(canvas.width) {
                    let idx = canvas.index(x, y);
                    if !canvas.unknown[idx] {
                        for c in 0..3 {
                            sum[c] += canvas.pixels[idx][c];
                        }
                        count += 1.0;
                    }
                }
            }
            if count > 0.0 {
                let coarse = cy * width + cx;
                pixels[coarse] = sum.map(|s| s / count);
                unknown[coarse] = false;
            }
        }
    }

    Canvas {
        width,
        height,
        pixels,
        unknown,
    }
}

fn pyramid(canvas: &mut Canvas, steps: u32) {
    if canvas.unknown_count() == 0 {
        return;
    }
    if canvas.width <= MIN_LEVEL_SIZE || canvas.height <= MIN_LEVEL_SIZE {
        seed(canvas);
        relax(canvas, steps * BASE_STEP_FACTOR);
        return;
    }

    let mut coarse = downsample(canvas);
    pyramid(&mut coarse, steps);

    for y in 0..canvas.height {
        for x in 0..canvas.width {
            let idx = canvas.index(x, y);
            if canvas.unknown[idx] {
                canvas.pixels[idx] = coarse.pixels[coarse.index(x / 2, y / 2)];
            }
        }
    }
    relax(canvas, steps);
}
