//! Validated requests in, attachments out.

use crate::cleaning::{self, InpaintConfig, InpaintModel, ModelKind, CLEANING_CONFIG};
use crate::document::{self, Stylesheet};
use crate::error::Result;
use crate::upload::{Uploads, DOCUMENT_RULE, IMAGE_RULE, MASK_RULE};
use std::sync::Arc;

/// A validated conversion payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionRequest {
    /// Markdown source bytes (not yet decoded)
    Markdown { source: Vec<u8> },
    /// Image and mask bytes (not yet decoded)
    Clean { image: Vec<u8>, mask: Vec<u8> },
}

impl ConversionRequest {
    /// Validate the uploads of a document conversion.
    pub fn document(mut uploads: Uploads) -> Result<Self> {
        let file = uploads.take(&DOCUMENT_RULE)?;
        Ok(ConversionRequest::Markdown { source: file.bytes })
    }

    /// Validate the uploads of an image cleaning. `image` is checked first.
    pub fn clean(mut uploads: Uploads) -> Result<Self> {
        let image = uploads.take(&IMAGE_RULE)?;
        let mask = uploads.take(&MASK_RULE)?;
        Ok(ConversionRequest::Clean {
            image: image.bytes,
            mask: mask.bytes,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConversionRequest::Markdown { .. } => "markdown",
            ConversionRequest::Clean { .. } => "clean",
        }
    }
}

/// Output bytes plus how to deliver them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub filename: &'static str,
}

impl ConversionResult {
    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "application/pdf",
            filename: "converted.pdf",
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "image/png",
            filename: "cleaned.png",
        }
    }
}

/// Runs conversions against the process-wide model.
pub struct Converter {
    model: Arc<dyn InpaintModel>,
    config: InpaintConfig,
    stylesheet: Stylesheet,
}

impl Converter {
    pub fn new(model: Arc<dyn InpaintModel>) -> Self {
        Self {
            model,
            config: CLEANING_CONFIG,
            stylesheet: Stylesheet::default(),
        }
    }

    /// Load `kind` and wrap it.
    pub fn with_model(kind: ModelKind) -> Self {
        Self::new(kind.load())
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Produce exactly one result for a validated request.
    pub fn convert(&self, request: ConversionRequest) -> Result<ConversionResult> {
        match request {
            ConversionRequest::Markdown { source } => {
                let pdf = document::convert_markdown(&source, &self.stylesheet)?;
                Ok(ConversionResult::pdf(pdf))
            }
            ConversionRequest::Clean { image, mask } => {
                let png = cleaning::clean_image(&image, &mask, self.model.as_ref(), &self.config)?;
                Ok(ConversionResult::png(png))
            }
        }
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::upload::UploadedFile;

    fn uploads(fields: &[(&str, &str, &[u8])]) -> Uploads {
        fields
            .iter()
            .map(|(field, name, bytes)| (field.to_string(), UploadedFile::new(*name, bytes.to_vec())))
            .collect()
    }

    #[test]
    fn test_document_request() {
        let request = ConversionRequest::document(uploads(&[("file", "a.md", b"# A")])).unwrap();
        assert_eq!(request, ConversionRequest::Markdown { source: b"# A".to_vec() });
        assert_eq!(request.kind(), "markdown");
    }

    #[test]
    fn test_clean_request_checks_image_first() {
        let err = ConversionRequest::clean(uploads(&[])).unwrap_err();
        assert_eq!(err.to_string(), "No image provided");

        let err = ConversionRequest::clean(uploads(&[("image", "a.png", b"x")])).unwrap_err();
        assert_eq!(err.to_string(), "No mask provided");

        let err =
            ConversionRequest::clean(uploads(&[("image", "a.png", b"x"), ("mask", "m.gif", b"x")]))
                .unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedType { ref field, .. } if field == "mask"));
    }

    #[test]
    fn test_convert_markdown() {
        let converter = Converter::with_model(ModelKind::Telea);
        let result = converter
            .convert(ConversionRequest::Markdown {
                source: b"# Title\n\nBody".to_vec(),
            })
            .unwrap();
        assert_eq!(result.mime, "application/pdf");
        assert_eq!(result.filename, "converted.pdf");
        assert!(result.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_convert_bad_image_is_decode_error() {
        let converter = Converter::with_model(ModelKind::Diffusion);
        assert_eq!(converter.model_name(), "diffusion");
        let err = converter
            .convert(ConversionRequest::Clean {
                image: b"nope".to_vec(),
                mask: b"nope".to_vec(),
            })
            .unwrap_err();
        assert!(matches!(err, ConversionError::Decode(_)));
    }
}
