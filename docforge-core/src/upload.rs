//! Upload validation.
//!
//! Uploads arrive as named fields carrying a client-supplied filename and the
//! raw bytes. Nothing here touches the filesystem: an [`UploadedFile`] lives
//! only as long as the request that produced it.

use crate::error::{ConversionError, Result};
use std::collections::HashMap;

/// A single uploaded file, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Filename as sent by the client (may be empty when nothing was selected)
    pub filename: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Which field an endpoint expects and the extensions it accepts there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRule {
    pub field: &'static str,
    pub allowed_extensions: &'static [&'static str],
}

/// Markdown source for `/convert`.
pub const DOCUMENT_RULE: UploadRule = UploadRule {
    field: "file",
    allowed_extensions: &["md", "txt"],
};

/// Formats the image decoder is built with.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Source picture for `/clean-image`.
pub const IMAGE_RULE: UploadRule = UploadRule {
    field: "image",
    allowed_extensions: IMAGE_EXTENSIONS,
};

/// Grayscale mask for `/clean-image`.
pub const MASK_RULE: UploadRule = UploadRule {
    field: "mask",
    allowed_extensions: IMAGE_EXTENSIONS,
};

/// Extension of `filename`, lowercased. A name without a dot has none.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Whether `filename` carries one of `allowed` as its extension.
pub fn allowed_file(filename: &str, allowed: &[&str]) -> bool {
    match extension(filename) {
        Some(ext) => allowed.iter().any(|a| *a == ext),
        None => false,
    }
}

/// Check a single upload candidate against `rule`.
pub fn validate<'a>(rule: &UploadRule, candidate: Option<&'a UploadedFile>) -> Result<&'a UploadedFile> {
    let file = candidate.ok_or_else(|| ConversionError::MissingField(rule.field.to_string()))?;

    if file.filename.is_empty() {
        return Err(ConversionError::EmptySelection(rule.field.to_string()));
    }

    if !allowed_file(&file.filename, rule.allowed_extensions) {
        return Err(ConversionError::UnsupportedType {
            field: rule.field.to_string(),
            filename: file.filename.clone(),
        });
    }

    Ok(file)
}

/// The file fields of one multipart request, keyed by field name.
#[derive(Debug, Default, Clone)]
pub struct Uploads {
    files: HashMap<String, UploadedFile>,
}

impl Uploads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file field. When a name repeats, the first occurrence wins.
    pub fn insert(&mut self, field: impl Into<String>, file: UploadedFile) {
        self.files.entry(field.into()).or_insert(file);
    }

    pub fn get(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Validate `rule` and move the matching file out.
    pub fn take(&mut self, rule: &UploadRule) -> Result<UploadedFile> {
        validate(rule, self.files.get(rule.field))?;
        self.files
            .remove(rule.field)
            .ok_or_else(|| ConversionError::MissingField(rule.field.to_string()))
    }
}

impl FromIterator<(String, UploadedFile)> for Uploads {
    fn from_iter<I: IntoIterator<Item = (String, UploadedFile)>>(iter: I) -> Self {
        let mut uploads = Uploads::new();
        for (field, file) in iter {
            uploads.insert(field, file);
        }
        uploads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn uploads_with(field: &str, filename: &str) -> Uploads {
        let mut uploads = Uploads::new();
        uploads.insert(field, UploadedFile::new(filename, b"# hi".to_vec()));
        uploads
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("notes.md"), Some("md".to_string()));
        assert_eq!(extension("archive.tar.TXT"), Some("txt".to_string()));
        assert_eq!(extension("README"), None);
        assert_eq!(extension("trailing."), Some(String::new()));
    }

    #[test]
    fn test_allowed_file_is_case_insensitive() {
        assert!(allowed_file("Notes.MD", DOCUMENT_RULE.allowed_extensions));
        assert!(allowed_file("a.b.txt", DOCUMENT_RULE.allowed_extensions));
        assert!(!allowed_file("notes.markdown", DOCUMENT_RULE.allowed_extensions));
        assert!(!allowed_file("md", DOCUMENT_RULE.allowed_extensions));
        assert!(!allowed_file(".", DOCUMENT_RULE.allowed_extensions));
    }

    #[test]
    fn test_missing_field() {
        let mut uploads = uploads_with("other", "notes.md");
        let err = uploads.take(&DOCUMENT_RULE).unwrap_err();
        assert!(matches!(err, ConversionError::MissingField(ref f) if f == "file"));
        // The unrelated field is untouched
        assert_eq!(uploads.len(), 1);
    }

    #[test]
    fn test_empty_selection() {
        let mut uploads = uploads_with("file", "");
        let err = uploads.take(&DOCUMENT_RULE).unwrap_err();
        assert!(matches!(err, ConversionError::EmptySelection(_)));
    }

    #[test]
    fn test_unsupported_type() {
        let mut uploads = uploads_with("file", "report.pdf");
        let err = uploads.take(&DOCUMENT_RULE).unwrap_err();
        match err {
            ConversionError::UnsupportedType { field, filename } => {
                assert_eq!(field, "file");
                assert_eq!(filename, "report.pdf");
            }
            other => panic!("Expected UnsupportedType, got {other:?}"),
        }
    }

    #[test]
    fn test_take_moves_file_out() {
        let mut uploads = uploads_with("file", "notes.md");
        let file = uploads.take(&DOCUMENT_RULE).unwrap();
        assert_eq!(file.filename, "notes.md");
        assert_eq!(file.bytes, b"# hi");
        assert!(uploads.is_empty());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let uploads: Uploads = vec![
            ("image".to_string(), UploadedFile::new("first.png", vec![1])),
            ("image".to_string(), UploadedFile::new("second.png", vec![2])),
        ]
        .into_iter()
        .collect();
        assert_eq!(uploads.get("image").unwrap().filename, "first.png");
    }

    #[test]
    fn test_image_rules_accept_common_formats() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.webp", "e.bmp"] {
            assert!(validate(&IMAGE_RULE, Some(&UploadedFile::new(name, vec![]))).is_ok());
            assert!(validate(&MASK_RULE, Some(&UploadedFile::new(name, vec![]))).is_ok());
        }
        assert!(validate(&IMAGE_RULE, Some(&UploadedFile::new("f.gif", vec![]))).is_err());
    }

    proptest! {
        #[test]
        fn prop_names_without_allowed_extension_are_rejected(stem in "[a-zA-Z0-9_ -]{1,20}", ext in "[a-z]{1,5}") {
            prop_assume!(ext != "md" && ext != "txt");
            let file = UploadedFile::new(format!("{stem}.{ext}"), b"# Title".to_vec());
            let result = validate(&DOCUMENT_RULE, Some(&file));
            let is_unsupported = matches!(result, Err(ConversionError::UnsupportedType { .. }));
            prop_assert!(is_unsupported);
        }

        #[test]
        fn prop_allowed_extensions_pass_regardless_of_content(stem in "[a-zA-Z0-9_ -]{1,20}", bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let file = UploadedFile::new(format!("{stem}.md"), bytes);
            prop_assert!(validate(&DOCUMENT_RULE, Some(&file)).is_ok());
        }
    }
}
