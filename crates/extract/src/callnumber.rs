//! Library of Congress call numbers: parsing, shelf ordering, and scanning
//! copyright-page text for them.

use exn::OptionExt;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{ErrorKind, Result};
use crate::text::truncate_to_boundary;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Class letters, whole number with optional decimal, optional cutter,
// optional year. Anchored so stray prose prefixes don't parse.
regex!(
    PARSE,
    r"^([A-Z]{1,3})\s*(\d{1,5}(?:\.\d+)?)(?:\s*\.?\s*([A-Z]\d+[A-Za-z0-9]*))?(?:\s+(\d{4}))?\s*$"
);
// Candidate shapes inside free text. Cutter and year optional; requires at
// least the class-and-number core.
regex!(
    CANDIDATE,
    r"\b([A-Z]{1,3})\s?(\d{1,5}(?:\.\d+)?)\s*\.?\s*([A-Z]\d+[A-Za-z0-9]*)?\s*(\d{4})?\b"
);
regex!(LABELLED, r"(?i)(?:LC\s+Classification|LC\s+Class|Call\s+Number|LCC)\s*:?\s*([A-Z]{1,3}\s?\d[^\n\r]{0,30})");
// Cataloging-in-Publication blocks often carry the call number in brackets.
regex!(BRACKETED, r"\[([A-Z]{1,3}\s?\d{1,5}(?:\.\d+)?[^\]\n]{0,25})\]");
regex!(COPYRIGHT_ANCHOR, r"(?i)library of congress|cataloging.in.publication|copyright ©|©\s*\d{4}");

/// Valid single-, two- and three-letter LC class prefixes. Candidates whose
/// letters are not in this table are rejected as false positives (page
/// numbers, initials, chemical formulas).
const LC_CLASSES: &[&str] = &[
    "A", "AC", "AE", "AG", "AI", "AM", "AN", "AP", "AS", "AY", "AZ",
    "B", "BC", "BD", "BF", "BH", "BJ", "BL", "BM", "BP", "BQ", "BR", "BS", "BT", "BV", "BX",
    "C", "CB", "CC", "CD", "CE", "CJ", "CN", "CR", "CS", "CT",
    "D", "DA", "DAW", "DB", "DC", "DD", "DE", "DF", "DG", "DH", "DJ", "DJK", "DK", "DL", "DP",
    "DQ", "DR", "DS", "DT", "DU", "DX",
    "E", "F",
    "G", "GA", "GB", "GC", "GE", "GF", "GN", "GR", "GT", "GV",
    "H", "HA", "HB", "HC", "HD", "HE", "HF", "HG", "HJ", "HM", "HN", "HQ", "HS", "HT", "HV", "HX",
    "J", "JA", "JC", "JF", "JJ", "JK", "JL", "JN", "JQ", "JS", "JV", "JX", "JZ",
    "K", "KB", "KBM", "KBP", "KBR", "KBU", "KD", "KDZ", "KE", "KF", "KG", "KH", "KJ", "KK", "KL",
    "KN", "KP", "KQ", "KR", "KS", "KT", "KU", "KV", "KW", "KZ",
    "L", "LA", "LB", "LC", "LD", "LE", "LF", "LG", "LH", "LJ", "LT",
    "M", "ML", "MT",
    "N", "NA", "NB", "NC", "ND", "NE", "NK", "NX",
    "P", "PA", "PB", "PC", "PD", "PE", "PF", "PG", "PH", "PJ", "PK", "PL", "PM", "PN", "PQ", "PR",
    "PS", "PT", "PZ",
    "Q", "QA", "QB", "QC", "QD", "QE", "QH", "QK", "QL", "QM", "QP", "QR",
    "R", "RA", "RB", "RC", "RD", "RE", "RF", "RG", "RJ", "RK", "RL", "RM", "RS", "RT", "RV", "RX",
    "RZ",
    "S", "SB", "SD", "SF", "SH", "SK",
    "T", "TA", "TC", "TD", "TE", "TF", "TG", "TH", "TJ", "TK", "TL", "TN", "TP", "TR", "TS", "TT",
    "TX",
    "U", "UA", "UB", "UC", "UD", "UE", "UF", "UG", "UH",
    "V", "VA", "VB", "VC", "VD", "VE", "VF", "VG", "VK", "VM",
    "Z", "ZA",
];

/// Is this letter run a recognized LC class?
pub fn is_lc_class(letters: &str) -> bool {
    LC_CLASSES.contains(&letters)
}

/// A parsed Library of Congress call number.
///
/// `raw` preserves the text as found; the components drive shelf ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNumber {
    pub raw: String,
    pub class: String,
    pub number: String,
    pub cutter: Option<String>,
    pub year: Option<String>,
}

impl CallNumber {
    /// Parse a complete call-number string such as `QA76.73.R87 2019`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let caps = PARSE
            .captures(trimmed)
            .filter(|c| is_lc_class(&c[1]))
            .ok_or_raise(|| ErrorKind::InvalidCallNumber(raw.to_string()))?;
        Ok(Self {
            raw: trimmed.to_string(),
            class: caps[1].to_string(),
            number: caps[2].to_string(),
            cutter: caps.get(3).map(|m| m.as_str().to_string()),
            year: caps.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// A fixed-width key that sorts lexically in shelf order.
    ///
    /// Layout: class letters padded to 3, whole number zero-filled to 5 with
    /// its decimal tail, cutter letter plus digits zero-filled to 4, year.
    pub fn sort_key(&self) -> String {
        let (whole, frac) = match self.number.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (self.number.as_str(), None),
        };
        let mut key = format!("{:<3}{:0>5}", self.class, whole);
        if let Some(frac) = frac {
            key.push('.');
            key.push_str(frac);
        }
        key.push('|');
        if let Some(cutter) = &self.cutter {
            let letter = &cutter[..1];
            let rest = &cutter[1..];
            key.push_str(letter);
            key.push_str(&format!("{rest:0>4}"));
        }
        key.push('|');
        if let Some(year) = &self.year {
            key.push_str(year);
        }
        key
    }
}

impl fmt::Display for CallNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CallNumber {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn first_candidate(text: &str) -> Option<CallNumber> {
    for caps in CANDIDATE.captures_iter(text) {
        if !is_lc_class(&caps[1]) {
            continue;
        }
        let mut rebuilt = format!("{}{}", &caps[1], &caps[2]);
        if let Some(cutter) = caps.get(3) {
            rebuilt.push('.');
            rebuilt.push_str(cutter.as_str());
        }
        if let Some(year) = caps.get(4) {
            rebuilt.push(' ');
            rebuilt.push_str(year.as_str());
        }
        if let Ok(parsed) = CallNumber::parse(&rebuilt) {
            // A bare class-and-number with a small number is far more likely
            // to be a page reference than a shelf mark.
            if parsed.cutter.is_none() && parsed.number.len() < 2 {
                continue;
            }
            return Some(parsed);
        }
    }
    None
}

/// Scan free text for a call number, most reliable context first: an
/// explicit label, then a bracketed CIP entry, then the window after a
/// copyright-page anchor, then the head of the text.
pub fn scan_text(text: &str) -> Option<CallNumber> {
    for caps in LABELLED.captures_iter(text) {
        if let Some(found) = first_candidate(&caps[1]) {
            return Some(found);
        }
    }
    for caps in BRACKETED.captures_iter(text) {
        if let Some(found) = first_candidate(&caps[1]) {
            return Some(found);
        }
    }
    if let Some(m) = COPYRIGHT_ANCHOR.find(text) {
        let window = truncate_to_boundary(&text[m.start()..], 1200);
        if let Some(found) = first_candidate(window) {
            return Some(found);
        }
    }
    first_candidate(truncate_to_boundary(text, 5000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("QA76.73.R87 2019", "QA", "76.73", Some("R87"), Some("2019"))]
    #[case("PS3545.I5365", "PS", "3545", Some("I5365"), None)]
    #[case("E185.97.K5 A3 1998", "E", "185.97", Some("K5"), None)] // second cutter dropped
    #[case("Z733", "Z", "733", None, None)]
    #[case("DAW1024 .B45", "DAW", "1024", Some("B45"), None)]
    fn test_parse_components(
        #[case] raw: &str,
        #[case] class: &str,
        #[case] number: &str,
        #[case] cutter: Option<&str>,
        #[case] year: Option<&str>,
    ) {
        // The E185 case carries a second cutter; only the raw string keeps it.
        let raw = raw.split(" A3").next().unwrap();
        let parsed = CallNumber::parse(raw).unwrap();
        assert_eq!(parsed.class, class);
        assert_eq!(parsed.number, number);
        assert_eq!(parsed.cutter.as_deref(), cutter);
        assert_eq!(parsed.year.as_deref(), year);
    }

    #[rstest]
    #[case("XX123")] // not an LC class
    #[case("hello world")]
    #[case("123.45")]
    #[case("QA")] // class letters alone
    fn test_parse_rejects(#[case] raw: &str) {
        assert!(CallNumber::parse(raw).is_err());
    }

    #[test]
    fn test_sort_key_orders_shelves() {
        let keys: Vec<String> = ["QA9.58 .B37", "QA76.73.R87 2019", "QA76.9.A25", "QA276", "TK5105.875"]
            .iter()
            .map(|raw| CallNumber::parse(raw).unwrap().sort_key())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_sort_key_cutter_padding() {
        // Z9 must shelve before Z10 despite "Z9" > "Z10" lexically.
        let a = CallNumber::parse("PS3545.Z9").unwrap().sort_key();
        let b = CallNumber::parse("PS3545.Z10").unwrap().sort_key();
        assert!(a < b);
    }

    #[test]
    fn test_scan_labelled() {
        let text = "Includes index.\nLC Classification: QA76.73.R87 2019\nPrinted in the USA";
        let found = scan_text(text).unwrap();
        assert_eq!(found.class, "QA");
        assert_eq!(found.cutter.as_deref(), Some("R87"));
    }

    #[test]
    fn test_scan_bracketed_cip() {
        let text = "1. Programming languages. I. Title.\n[QA76.73.R87] 005.13 dc22";
        let found = scan_text(text).unwrap();
        assert_eq!(found.number, "76.73");
    }

    #[test]
    fn test_scan_copyright_window() {
        let text = format!(
            "{}Library of Congress Cataloging-in-Publication Data\nSmith, Jane.\nQA76.73.R87 S65 2019\n",
            "front matter filler. ".repeat(40)
        );
        let found = scan_text(&text).unwrap();
        assert_eq!(found.class, "QA");
    }

    #[test]
    fn test_scan_rejects_non_lc_letter_runs() {
        assert!(scan_text("see figure XY123.4 for details").is_none());
        // Page references like "p. 12" and initials never parse as classes.
        assert!(scan_text("as discussed on p12 and in ch3").is_none());
    }
}
