use super::config::InpaintConfig;
use super::diffusion::DiffusionModel;
use super::telea::TeleaModel;
use crate::error::Result;
use image::{GrayImage, RgbImage};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// An inpainting model.
///
/// Models are built once at startup and shared by every request, so
/// inference takes `&self` and implementations must be `Send + Sync`.
pub trait InpaintModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Fill the pixels of `image` selected by `mask`.
    ///
    /// `mask` has the same dimensions as `image`; values above 127 select a
    /// pixel. The returned image has the input's dimensions.
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, config: &InpaintConfig) -> Result<RgbImage>;
}

/// The models this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    Telea,
    Diffusion,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Telea, ModelKind::Diffusion];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Telea => "telea",
            ModelKind::Diffusion => "diffusion",
        }
    }

    /// Build the model behind a shared, read-only handle.
    pub fn load(self) -> Arc<dyn InpaintModel> {
        tracing::info!("Loading inpainting model '{}'", self);
        match self {
            ModelKind::Telea => Arc::new(TeleaModel),
            ModelKind::Diffusion => Arc::new(DiffusionModel),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown inpainting model '{0}' (expected 'telea' or 'diffusion')")]
pub struct UnknownModel(pub String);

impl FromStr for ModelKind {
    type Err = UnknownModel;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_kind() {
        assert_eq!("telea".parse::<ModelKind>(), Ok(ModelKind::Telea));
        assert_eq!(" Diffusion ".parse::<ModelKind>(), Ok(ModelKind::Diffusion));
        assert_eq!(
            "lama".parse::<ModelKind>(),
            Err(UnknownModel("lama".to_string()))
        );
    }

    #[test]
    fn test_load_matches_kind() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.load().name(), kind.as_str());
        }
        assert_eq!(ModelKind::default(), ModelKind::Telea);
    }
}
