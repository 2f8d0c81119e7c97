//! File-format detection and per-format text harvesting.

pub(crate) mod epub;
pub(crate) mod mobi;
mod pdf;

use crate::ocr::TextRecognizer;

/// Book file formats the scanner recognizes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Epub,
    Mobi,
    Azw,
    Azw3,
    /// Amazon's successor container. Proprietary layout; catalogued but
    /// never harvested.
    Kfx,
    Pdf,
    Djvu,
    Comic,
    Image,
    Audio,
}

impl Format {
    /// Map a lowercase file extension to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Some(match ext {
            "epub" => Self::Epub,
            "mobi" => Self::Mobi,
            "azw" => Self::Azw,
            "azw3" => Self::Azw3,
            "kfx" => Self::Kfx,
            "pdf" => Self::Pdf,
            "djvu" | "djv" => Self::Djvu,
            "cbz" | "cbr" => Self::Comic,
            "jpg" | "jpeg" | "png" | "tif" | "tiff" => Self::Image,
            "m4b" | "mp3" | "aax" => Self::Audio,
            _ => None?,
        })
    }

    /// Whether text harvesting is implemented for this format. The rest are
    /// still catalogued, just never auto-identified.
    pub fn attempts_extraction(self) -> bool {
        matches!(self, Self::Epub | Self::Mobi | Self::Azw | Self::Azw3 | Self::Pdf)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Epub => "epub",
            Self::Mobi => "mobi",
            Self::Azw => "azw",
            Self::Azw3 => "azw3",
            Self::Kfx => "kfx",
            Self::Pdf => "pdf",
            Self::Djvu => "djvu",
            Self::Comic => "comic",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// Harvest searchable text from file bytes according to format. Formats
/// without extraction support yield an empty string.
pub fn harvest(bytes: &[u8], format: Format, recognizer: Option<&dyn TextRecognizer>) -> String {
    match format {
        Format::Epub => epub::harvest(bytes),
        Format::Mobi | Format::Azw => mobi::harvest(bytes),
        // AZW3 files are Palm databases, but some tools ship them as zip
        // containers; try the cheaper container read first.
        Format::Azw3 => {
            let text = epub::harvest(bytes);
            if text.is_empty() { mobi::harvest(bytes) } else { text }
        }
        Format::Pdf => pdf::harvest(bytes, recognizer),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("epub", Some(Format::Epub))]
    #[case("azw3", Some(Format::Azw3))]
    #[case("kfx", Some(Format::Kfx))]
    #[case("PDF", None)] // caller lowercases
    #[case("txt", None)]
    #[case("cbz", Some(Format::Comic))]
    fn test_from_extension(#[case] ext: &str, #[case] expected: Option<Format>) {
        assert_eq!(Format::from_extension(ext), expected);
    }

    #[test]
    fn test_extraction_support() {
        assert!(Format::Epub.attempts_extraction());
        assert!(Format::Azw3.attempts_extraction());
        assert!(!Format::Audio.attempts_extraction());
        assert!(!Format::Djvu.attempts_extraction());
        // KFX is neither a zip container nor a Palm database; harvesting
        // would be guaranteed dead ends.
        assert!(!Format::Kfx.attempts_extraction());
    }

    #[test]
    fn test_azw3_falls_back_to_palm_layout() {
        let bytes = super::mobi::tests::fixture_mobi("9780306406157");
        let text = harvest(&bytes, Format::Azw3, None);
        assert!(text.contains("9780306406157"));
    }

    #[test]
    fn test_epub_dispatch() {
        let bytes = super::epub::tests::fixture_epub("urn:isbn:9783161484100", "x");
        let text = harvest(&bytes, Format::Epub, None);
        assert!(text.contains("9783161484100"));
    }
}
