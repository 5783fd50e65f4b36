//! Fast-marching inpainting (Telea, 2004).
//!
//! Pixels are filled in order of their distance from the mask boundary. Each
//! new pixel is a weighted average of the already-known pixels within
//! `radius`, favouring close pixels, pixels on the same level set and pixels
//! along the marching direction.

use super::config::InpaintConfig;
use super::model::InpaintModel;
use super::raster::Canvas;
use crate::error::{ConversionError, Result};
use image::{GrayImage, RgbImage};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

const KNOWN: u8 = 0;
const BAND: u8 = 1;
const INSIDE: u8 = 2;
const FAR: f32 = 1.0e6;

#[derive(Debug, Clone, Copy)]
pub struct TeleaModel;

impl InpaintModel for TeleaModel {
    fn name(&self) -> &'static str {
        "telea"
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

        FastMarch::new(&canvas, config.radius.max(1) as i64).run(&mut canvas);
        Ok(canvas.into_image())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Front {
    distance: f32,
    idx: usize,
}

impl Eq for Front {}

impl Ord for Front {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.idx.cmp(&other.idx))
    }
}

impl PartialOrd for Front {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct FastMarch {
    flags: Vec<u8>,
    distance: Vec<f32>,
    heap: BinaryHeap<Reverse<Front>>,
    radius: i64,
}

impl FastMarch {
    fn new(canvas: &Canvas, radius: i64) -> Self {
        let mut flags = vec![KNOWN; canvas.len()];
        let mut distance = vec![0.0; canvas.len()];
        for (idx, unknown) in canvas.unknown.iter().enumerate() {
            if *unknown {
                flags[idx] = INSIDE;
                distance[idx] = FAR;
            }
        }

        let mut heap = BinaryHeap::new();
        for idx in 0..canvas.len() {
            if flags[idx] == KNOWN && canvas.neighbours(idx).any(|n| flags[n] == INSIDE) {
                flags[idx] = BAND;
                heap.push(Reverse(Front { distance: 0.0, idx }));
            }
        }

        Self {
            flags,
            distance,
            heap,
            radius,
        }
    }

    fn run(mut self, canvas: &mut Canvas) {
        while let Some(Reverse(front)) = self.heap.pop() {
            if self.flags[front.idx] == KNOWN {
                continue;
            }
            self.flags[front.idx] = KNOWN;

            let neighbours: Vec<usize> = canvas.neighbours(front.idx).collect();
            for n in neighbours {
                if self.flags[n] != INSIDE {
                    continue;
                }
                self.distance[n] = self.arrival_time(canvas, n);
                self.fill(canvas, n);
                self.flags[n] = BAND;
                canvas.unknown[n] = false;
                self.heap.push(Reverse(Front {
                    distance: self.distance[n],
                    idx: n,
                }));
            }
        }
    }

    fn available(&self, idx: Option<usize>) -> Option<usize> {
        idx.filter(|&i| self.flags[i] != INSIDE)
    }

    /// First-order upwind solution of |∇T| = 1 from two orthogonal neighbours.
    fn solve(&self, a: Option<usize>, b: Option<usize>) -> f32 {
        match (self.available(a), self.available(b)) {
            (Some(a), Some(b)) => {
                let (ta, tb) = (self.distance[a], self.distance[b]);
                let diff = ta - tb;
                if diff.abs() >= 1.0 {
                    1.0 + ta.min(tb)
                } else {
                    (ta + tb + (2.0 - diff * diff).sqrt()) * 0.5
                }
            }
            (Some(a), None) => 1.0 + self.distance[a],
            (None, Some(b)) => 1.0 + self.distance[b],
            (None, None) => FAR,
        }
    }

    fn arrival_time(&self, canvas: &Canvas, idx: usize) -> f32 {
        let (x, y) = (idx % canvas.width, idx / canvas.width);
        let left = (x > 0).then(|| idx - 1);
        let right = (x + 1 < canvas.width).then(|| idx + 1);
        let up = (y > 0).then(|| idx - canvas.width);
        let down = (y + 1 < canvas.height).then(|| idx + canvas.width);

        self.solve(up, left)
            .min(self.solve(down, left))
            .min(self.solve(up, right))
            .min(self.solve(down, right))
    }

    /// Central difference of the distance field, falling back to one-sided.
    fn gradient(&self, center: usize, before: Option<usize>, after: Option<usize>) -> f32 {
        match (self.available(before), self.available(after)) {
            (Some(b), Some(a)) => (self.distance[a] - self.distance[b]) * 0.5,
            (None, Some(a)) => self.distance[a] - self.distance[center],
            (Some(b), None) => self.distance[center] - self.distance[b],
            (None, None) => 0.0,
        }
    }

    fn fill(&self, canvas: &mut Canvas, idx: usize) {
        let (w, h) = (canvas.width as i64, canvas.height as i64);
        let (x, y) = ((idx % canvas.width) as i64, (idx / canvas.width) as i64);
        let grad_x = self.gradient(
            idx,
            (x > 0).then(|| idx - 1),
            (x + 1 < w).then(|| idx + 1),
        );
        let grad_y = self.gradient(
            idx,
            (y > 0).then(|| idx - canvas.width),
            (y + 1 < h).then(|| idx + canvas.width),
        );
        let t = self.distance[idx];

        let mut sum = [0.0f32; 3];
        let mut total = 0.0f32;
        let r2 = self.radius * self.radius;

        for qy in (y - self.radius).max(0)..=(y + self.radius).min(h - 1) {
            for qx in (x - self.radius).max(0)..=(x + self.radius).min(w - 1) {
                let (rx, ry) = (x - qx, y - qy);
                let len2 = rx * rx + ry * ry;
                if len2 == 0 || len2 > r2 {
                    continue;
                }
                let q = (qy * w + qx) as usize;
                if self.flags[q] == INSIDE {
                    continue;
                }

                let len2 = len2 as f32;
                let mut direction = rx as f32 * grad_x + ry as f32 * grad_y;
                if direction.abs() <= 0.01 {
                    direction = 1.0e-6;
                }
                let proximity = 1.0 / (len2 * len2.sqrt());
                let level = 1.0 / (1.0 + (self.distance[q] - t).abs());
                let weight = (direction * proximity * level).abs();

                let color = canvas.pixels[q];
                for c in 0..3 {
                    sum[c] += color[c] * weight;
                }
                total += weight;
            }
        }

        if total > f32::EPSILON {
            canvas.pixels[idx] = sum.map(|s| s / total);
        } else {
            let known: Vec<[f32; 3]> = canvas
                .neighbours(idx)
                .filter(|&n| self.flags[n] != INSIDE)
                .map(|n| canvas.pixels[n])
                .collect();
            if !known.is_empty() {
                let count = known.len() as f32;
                let mut mean = [0.0f32; 3];
                for color in &known {
                    for c in 0..3 {
                        mean[c] += color[c] / count;
                    }
                }
                canvas.pixels[idx] = mean;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn square_mask(size: u32, from: u32, to: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (from..to).contains(&x) && (from..to).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_solid_color_hole_is_restored() {
        let image = RgbImage::from_pixel(32, 32, Rgb([200, 40, 90]));
        let mut damaged = image.clone();
        for y in 10..20 {
            for x in 10..20 {
                damaged.put_pixel(x, y, Rgb([0, 255, 0]));
            }
        }
        let mask = square_mask(32, 10, 20);

        let result = TeleaModel.inpaint(&damaged, &mask, &InpaintConfig::default()).unwrap();
        assert_eq!(result.dimensions(), (32, 32));
        for px in result.pixels() {
            assert_eq!(*px, Rgb([200, 40, 90]));
        }
    }

    #[test]
    fn test_horizontal_gradient_is_continued() {
        let image = RgbImage::from_fn(40, 40, |x, _| {
            let v = (x * 6) as u8;
            Rgb([v, v, v])
        });
        let mask = square_mask(40, 15, 25);

        let result = TeleaModel.inpaint(&image, &mask, &InpaintConfig::default()).unwrap();
        let left = result.get_pixel(16, 20)[0] as i32;
        let right = result.get_pixel(23, 20)[0] as i32;
        assert!(left < right, "fill should follow the gradient: {left} vs {right}");
        // Untouched pixels keep their value
        assert_eq!(result.get_pixel(2, 2), image.get_pixel(2, 2));
    }

    #[test]
    fn test_empty_mask_is_identity() {
        let image = RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8, y as u8, 7]));
        let mask = GrayImage::new(8, 8);
        let result = TeleaModel.inpaint(&image, &mask, &InpaintConfig::default()).unwrap();
        assert_eq!(result, image);
    }

    #[test]
    fn test_full_mask_is_inference_error() {
        let image = RgbImage::new(4, 4);
        let mask = GrayImage::from_pixel(4, 4, Luma([255]));
        let err = TeleaModel.inpaint(&image, &mask, &InpaintConfig::default()).unwrap_err();
        assert!(matches!(err, ConversionError::Inference(_)));
    }

    #[test]
    fn test_front_ordering_is_min_heap() {
        let mut heap = BinaryHeap::new();
        heap.push(Reverse(Front { distance: 3.0, idx: 0 }));
        heap.push(Reverse(Front { distance: 1.0, idx: 1 }));
        heap.push(Reverse(Front { distance: 2.0, idx: 2 }));
        assert_eq!(heap.pop().unwrap().0.idx, 1);
        assert_eq!(heap.pop().unwrap().0.idx, 2);
    }
}
