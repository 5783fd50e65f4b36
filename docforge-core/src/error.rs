use thiserror::Error;

/// Every way a conversion can fail, from upload validation to output encoding.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("No {0} provided")]
    MissingField(String),

    #[error("No file selected")]
    EmptySelection(String),

    #[error("Invalid file type")]
    UnsupportedType { field: String, filename: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Document is nested too deeply ({depth} levels, at most {limit} allowed)")]
    TooDeeplyNested { depth: usize, limit: usize },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl ConversionError {
    /// True when the caller sent something we cannot work with.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConversionError::MissingField(_)
                | ConversionError::EmptySelection(_)
                | ConversionError::UnsupportedType { .. }
                | ConversionError::Decode(_)
                | ConversionError::TooDeeplyNested { .. }
        )
    }
}

impl From<oxidize_pdf::PdfError> for ConversionError {
    fn from(err: oxidize_pdf::PdfError) -> Self {
        ConversionError::Render(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;
