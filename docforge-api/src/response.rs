use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use docforge_core::ConversionResult;

/// Deliver a conversion result as a downloadable attachment.
pub fn attachment(result: ConversionResult) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", result.filename);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, result.mime.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        result.bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_attachment_headers() {
        let response = attachment(ConversionResult::pdf(b"%PDF-1.7".to_vec()));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"converted.pdf\""
        );
    }

    #[test]
    fn test_png_attachment_headers() {
        let response = attachment(ConversionResult::png(vec![0x89, b'P', b'N', b'G']));

        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"cleaned.png\""
        );
    }
}
