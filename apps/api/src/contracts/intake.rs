//! Upload intake — size and signature validation followed by text extraction.
//!
//! Validation happens before anything is stored or sent to an external
//! service. Extraction runs `pdf-extract` on a blocking thread; the parser is
//! treated as untrusted, so both its errors and its panics surface as
//! `UnextractableText`.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::errors::AppError;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Readers accept the header anywhere in the first kilobyte.
const SIGNATURE_WINDOW: usize = 1024;

/// A validated upload with its extracted, whitespace-normalized text.
#[derive(Debug, Clone)]
pub struct IntakeDocument {
    pub bytes: Bytes,
    pub text: String,
}

/// Validates and extracts an uploaded contract.
pub async fn accept(bytes: Bytes, max_upload_bytes: usize) -> Result<IntakeDocument, AppError> {
    validate(&bytes, max_upload_bytes)?;
    let text = extract_text(bytes.clone()).await?;
    debug!("Extracted {} characters from {} byte PDF", text.len(), bytes.len());
    Ok(IntakeDocument { bytes, text })
}

/// Size first, then signature. Neither touches the parser.
pub fn validate(bytes: &[u8], max_upload_bytes: usize) -> Result<(), AppError> {
    if bytes.len() > max_upload_bytes {
        return Err(AppError::FileTooLarge {
            limit: max_upload_bytes,
        });
    }
    if !has_pdf_signature(bytes) {
        return Err(AppError::InvalidFileType);
    }
    Ok(())
}

fn has_pdf_signature(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SIGNATURE_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
}

async fn extract_text(bytes: Bytes) -> Result<String, AppError> {
    let extracted =
        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

    let raw = match extracted {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!("PDF text extraction failed: {e}");
            return Err(AppError::UnextractableText(e.to_string()));
        }
        Err(e) => {
            warn!("PDF text extraction aborted: {e}");
            return Err(AppError::UnextractableText(
                "PDF parser aborted on malformed input".to_string(),
            ));
        }
    };

    let text = normalize_text(&raw);
    if !has_readable_text(&text) {
        return Err(AppError::UnextractableText(
            "PDF contains no text layer (scanned or image-only)".to_string(),
        ));
    }
    Ok(text)
}

/// Collapses every whitespace run into a single space.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_readable_text(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oversized_upload_rejected_before_signature_check() {
        let bytes = vec![b'x'; 2048];
        let err = validate(&bytes, 1024).unwrap_err();
        assert!(matches!(err, AppError::FileTooLarge { limit: 1024 }));
    }

    #[test]
    fn test_text_file_renamed_to_pdf_is_invalid_type() {
        let bytes = b"This is a plain text employment agreement.";
        assert!(matches!(
            validate(bytes, 1024).unwrap_err(),
            AppError::InvalidFileType
        ));
    }

    #[test]
    fn test_empty_upload_is_invalid_type() {
        assert!(matches!(validate(b"", 1024).unwrap_err(), AppError::InvalidFileType));
    }

    #[test]
    fn test_signature_at_start_is_accepted() {
        assert!(validate(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n", 1024).is_ok());
    }

    #[test]
    fn test_signature_after_leading_junk_within_window_is_accepted() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(validate(&bytes, 4096).is_ok());
    }

    #[test]
    fn test_signature_beyond_window_is_rejected() {
        let mut bytes = vec![b' '; SIGNATURE_WINDOW + 10];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(matches!(
            validate(&bytes, 4096).unwrap_err(),
            AppError::InvalidFileType
        ));
    }

    #[test]
    fn test_exactly_at_limit_is_accepted() {
        let mut bytes = b"%PDF-1.4".to_vec();
        bytes.resize(64, b' ');
        assert!(validate(&bytes, 64).is_ok());
    }

    #[tokio::test]
    async fn test_malformed_pdf_body_is_unextractable() {
        let bytes = Bytes::from_static(b"%PDF-1.4\nthis is not a real pdf body\n%%EOF");
        let err = accept(bytes, 1024).await.unwrap_err();
        assert!(matches!(err, AppError::UnextractableText(_)));
    }

    #[test]
    fn test_normalize_text_collapses_whitespace() {
        assert_eq!(
            normalize_text("  EMPLOYMENT\n\nAGREEMENT\t between  "),
            "EMPLOYMENT AGREEMENT between"
        );
    }

    #[test]
    fn test_readable_text_requires_alphanumerics() {
        assert!(!has_readable_text(" \u{c} . , "));
        assert!(has_readable_text("Section 1"));
    }
}
