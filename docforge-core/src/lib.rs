//! # docforge-core
//!
//! Conversion pipelines behind the docforge service:
//!
//! - [`upload`]: validation of uploaded files (field presence, filename, extension)
//! - [`document`]: markdown to PDF (and standalone HTML)
//! - [`cleaning`]: removal of masked image content by inpainting
//! - [`pipeline`]: typed requests and results tying the above together
//!
//! ## Example
//!
//! ```rust
//! use docforge_core::{ConversionRequest, Converter, ModelKind, UploadedFile, Uploads};
//!
//! # fn main() -> docforge_core::Result<()> {
//! let mut uploads = Uploads::new();
//! uploads.insert("file", UploadedFile::new("notes.md", b"# Title\n\nBody".to_vec()));
//!
//! let converter = Converter::with_model(ModelKind::Telea);
//! let result = converter.convert(ConversionRequest::document(uploads)?)?;
//! assert!(result.bytes.starts_with(b"%PDF-"));
//! # Ok(())
//! # }
//! ```

pub mod cleaning;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod upload;

pub use cleaning::{InpaintConfig, InpaintModel, ModelKind, UnknownModel};
pub use error::{ConversionError, Result};
pub use pipeline::{ConversionRequest, ConversionResult, Converter};
pub use upload::{UploadRule, UploadedFile, Uploads};

/// Current version of docforge-core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
