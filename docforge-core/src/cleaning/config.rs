use std::fmt;

/// How images larger than the model's comfortable working size are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdStrategy {
    /// Always run on the full-resolution image
    Original,
    /// Run once per masked region, on a crop around it
    Crop,
    /// Run on a downscaled copy and upscale the filled pixels
    Resize,
}

/// Sampling scheme of the diffusion model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// Single-scale relaxation from a flat seed
    Jacobi,
    /// Coarse-to-fine relaxation over an image pyramid
    Pyramid,
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sampler::Jacobi => write!(f, "jacobi"),
            Sampler::Pyramid => write!(f, "pyramid"),
        }
    }
}

/// Inference settings passed to every model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InpaintConfig {
    /// Relaxation steps per pyramid level (diffusion)
    pub steps: u32,
    pub sampler: Sampler,
    pub hd_strategy: HdStrategy,
    /// Context kept around each masked region when cropping
    pub crop_margin: u32,
    /// Longer image side above which `Crop` kicks in
    pub crop_trigger_size: u32,
    /// Longer image side above which `Resize` downscales
    pub resize_limit: u32,
    /// Neighbourhood radius sampled per pixel (telea)
    pub radius: u32,
}

/// The settings `/clean-image` runs with. Not user-configurable.
pub const CLEANING_CONFIG: InpaintConfig = InpaintConfig {
    steps: 25,
    sampler: Sampler::Pyramid,
    hd_strategy: HdStrategy::Crop,
    crop_margin: 128,
    crop_trigger_size: 800,
    resize_limit: 1280,
    radius: 5,
};

impl Default for InpaintConfig {
    fn default() -> Self {
        CLEANING_CONFIG
    }
}
