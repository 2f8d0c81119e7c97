//! Identifier extraction from ebook files.
//!
//! Given the raw bytes of a book file, this crate harvests whatever
//! searchable text the format offers and scans it for an ISBN and a Library
//! of Congress call number. Extraction is best-effort by design: corrupt or
//! unsupported files produce an empty [`Extraction`], never an error, so one
//! bad download can't stall a library scan.

pub mod callnumber;
pub mod error;
pub mod formats;
pub mod isbn;
pub mod ocr;
pub mod text;

pub use callnumber::CallNumber;
pub use error::{Error, ErrorKind, Result};
pub use formats::Format;
pub use isbn::Isbn;
pub use ocr::TextRecognizer;

/// What a single file yielded.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub isbn: Option<Isbn>,
    pub call_number: Option<CallNumber>,
}

impl Extraction {
    /// Scan already-harvested text for identifiers.
    pub fn from_text(text: &str) -> Self {
        Self {
            isbn: isbn::scan_text(text),
            call_number: callnumber::scan_text(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.isbn.is_none() && self.call_number.is_none()
    }
}

/// Harvest and scan the bytes of one file.
#[tracing::instrument(skip(bytes, recognizer), fields(len = bytes.len()))]
pub fn extract(bytes: &[u8], format: Format, recognizer: Option<&dyn TextRecognizer>) -> Extraction {
    if !format.attempts_extraction() {
        return Extraction::default();
    }
    let text = formats::harvest(bytes, format, recognizer);
    let extraction = Extraction::from_text(&text);
    tracing::debug!(
        isbn = extraction.isbn.as_ref().map(|i| i.as_str()),
        call_number = extraction.call_number.as_ref().map(|c| c.raw.as_str()),
        "extraction finished",
    );
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_end_to_end_epub() {
        let bytes = formats::epub::tests::fixture_epub("urn:isbn:9783161484100", "front matter");
        let extraction = extract(&bytes, Format::Epub, None);
        assert_eq!(extraction.isbn.unwrap().as_str(), "9783161484100");
    }

    #[test]
    fn test_unsupported_format_yields_empty() {
        let extraction = extract(b"whatever", Format::Audio, None);
        assert!(extraction.is_empty());
    }

    #[test]
    fn test_from_text_finds_both_identifiers() {
        let text = "ISBN 978-0-306-40615-7\nLC Classification: QA76.73.R87 2019";
        let extraction = Extraction::from_text(text);
        assert_eq!(extraction.isbn.unwrap().as_str(), "9780306406157");
        assert_eq!(extraction.call_number.unwrap().class, "QA");
    }
}
