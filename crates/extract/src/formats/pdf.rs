//! Text harvesting from PDFs.
//!
//! Born-digital PDFs give up their text directly. Scanned ones extract to
//! near-empty whitespace soup; when the yield looks like that and a
//! recognizer was supplied, the document is handed over for OCR.

use crate::ocr::TextRecognizer;
use crate::text::{alpha_ratio, truncate_to_boundary};

const TEXT_BUDGET: usize = 80_000;
/// Below this fraction of letters the extraction is treated as a scan.
const MIN_ALPHA_RATIO: f64 = 0.05;
/// Extractions shorter than this are treated as empty regardless of ratio.
const MIN_TEXT_LEN: usize = 64;

pub fn harvest(bytes: &[u8], recognizer: Option<&dyn TextRecognizer>) -> String {
    let extracted = match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => text,
        Err(error) => {
            tracing::debug!(%error, "pdf text extraction failed");
            String::new()
        }
    };
    let extracted = truncate_to_boundary(&extracted, TEXT_BUDGET);
    if extracted.len() >= MIN_TEXT_LEN && alpha_ratio(extracted) >= MIN_ALPHA_RATIO {
        return extracted.to_string();
    }
    let Some(recognizer) = recognizer else {
        tracing::debug!("pdf looks scanned and no recognizer is available");
        return extracted.to_string();
    };
    match recognizer.text_from_document(bytes) {
        Ok(text) => truncate_to_boundary(&text, TEXT_BUDGET).to_string(),
        Err(error) => {
            tracing::warn!(%error, "ocr fallback failed");
            extracted.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::Canned;

    #[test]
    fn test_unreadable_pdf_without_recognizer_yields_nothing() {
        assert_eq!(harvest(b"%PDF-1.4 truncated garbage", None), "");
    }

    #[test]
    fn test_unreadable_pdf_falls_back_to_recognizer() {
        let recognizer = Canned("ISBN 978-0-306-40615-7");
        let text = harvest(b"%PDF-1.4 truncated garbage", Some(&recognizer));
        assert_eq!(text, "ISBN 978-0-306-40615-7");
    }
}
