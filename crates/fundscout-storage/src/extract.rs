//! Text-extraction collaborator consumed during profile ingestion.
//!
//! Document parsing is a pure function the core consumes; PDF/Word support
//! lives outside this workspace and plugs in through the same trait.

use fundscout_core::ExtractError;

pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractError>;
}

/// Built-in extractor for plain text and markdown documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractError> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or(mime_type)
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" | "text/markdown" => {
                String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::CorruptDocument {
                    detail: format!("invalid utf-8 at byte {}", e.utf8_error().valid_up_to()),
                })
            }
            _ => Err(ExtractError::UnsupportedFormat { mime: essence }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = PlainTextExtractor
            .extract_text(b"skills: rust, ml", "text/plain; charset=utf-8")
            .unwrap();
        assert_eq!(text, "skills: rust, ml");
    }

    #[test]
    fn unknown_mime_is_unsupported() {
        let err = PlainTextExtractor
            .extract_text(b"%PDF-1.7", "application/pdf")
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat { .. }));
    }

    #[test]
    fn invalid_utf8_is_corrupt() {
        let err = PlainTextExtractor
            .extract_text(&[0x66, 0xff, 0xfe], "text/plain")
            .unwrap_err();
        assert!(matches!(err, ExtractError::CorruptDocument { .. }));
    }
}
