//! Seam for optical character recognition.
//!
//! Scanned PDFs and image-based formats need a recognizer to become
//! searchable text. The engine is injected so the extraction pipeline stays
//! free of native OCR dependencies; without one, those files simply yield
//! nothing and stay unmatched for manual handling. The recognizer owns page
//! rasterization and receives the whole document.

use crate::error::Result;

/// Turns a scanned document into text.
pub trait TextRecognizer: Send + Sync {
    fn text_from_document(&self, bytes: &[u8]) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Recognizer returning a canned string, for exercising the OCR path.
    pub struct Canned(pub &'static str);

    impl TextRecognizer for Canned {
        fn text_from_document(&self, _bytes: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }
}
