use image::{GrayImage, Rgb, RgbImage};

/// Pixels above this mask value are filled.
pub const MASK_THRESHOLD: u8 = 127;

pub fn is_masked(value: u8) -> bool {
    value > MASK_THRESHOLD
}

/// Float working copy of an image plus the set of pixels still to be filled.
#[derive(Debug, Clone)]
pub(crate) struct Canvas {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[f32; 3]>,
    pub unknown: Vec<bool>,
}

impl Canvas {
    pub fn new(image: &RgbImage, mask: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
            .collect();
        let unknown = mask.pixels().map(|p| is_masked(p[0])).collect();
        Self {
            width: width as usize,
            height: height as usize,
            pixels,
            unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn unknown_count(&self) -> usize {
        self.unknown.iter().filter(|u| **u).count()
    }

    /// 4-connected neighbours of `idx` that lie inside the canvas.
    pub fn neighbours(&self, idx: usize) -> impl Iterator<Item = usize> {
        let (x, y) = (idx % self.width, idx / self.width);
        let (w, h) = (self.width, self.height);
        [
            (x > 0).then(|| idx - 1),
            (x + 1 < w).then(|| idx + 1),
            (y > 0).then(|| idx - w),
            (y + 1 < h).then(|| idx + w),
        ]
        .into_iter()
        .flatten()
    }

    pub fn into_image(self) -> RgbImage {
        let mut image = RgbImage::new(self.width as u32, self.height as u32);
        for (out, px) in image.pixels_mut().zip(self.pixels) {
            *out = Rgb(px.map(|c| c.round().clamp(0.0, 255.0) as u8));
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_canvas_roundtrip_and_neighbours() {
        let image = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let mut mask = GrayImage::new(3, 2);
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(2, 0, Luma([100]));

        let canvas = Canvas::new(&image, &mask);
        assert_eq!(canvas.len(), 6);
        assert_eq!(canvas.unknown_count(), 1);
        assert!(canvas.unknown[canvas.index(1, 1)]);

        let mut corner: Vec<usize> = canvas.neighbours(0).collect();
        corner.sort_unstable();
        assert_eq!(corner, vec![1, 3]);
        assert_eq!(canvas.neighbours(canvas.index(1, 1)).count(), 3);

        assert_eq!(canvas.into_image(), image);
    }
}
