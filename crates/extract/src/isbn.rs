//! ISBN parsing, checksum validation and free-text scanning.
//!
//! Identifiers are normalized to their 13-digit form. A 10-digit input is
//! upgraded by prepending `978` and recomputing the check digit; the original
//! 10-digit form is kept alongside for sources that only index by it.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{ErrorKind, Result};

// Dash/hyphen unicode variants plus space, as they appear on copyright pages.
const SEP: &str = r"[\-\u{2010}-\u{2015} ]";

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(
    LABELLED,
    &format!(r"(?i)ISBN{SEP}?(?:1[03])?{SEP}?:?\s*((?:97[89]{SEP}?)?(?:[0-9O]{SEP}?){{9}}[0-9Xx])")
);
// Bare ISBN-10 in publisher-number-check layout (0-671-42517-X) or as a
// plain ten-character run. The surrounding classes stand in for the
// lookarounds the original notation would use.
regex!(
    BARE_TEN,
    r"(?:^|[^0-9A-Za-z])((?:0[- ]?[0-9]{1,5}[- ]?[0-9]{2,7}[- ]?[0-9]{1,6}[- ]?[0-9Xx])|(?:[0-9]{9}[0-9Xx]))(?:[^0-9A-Za-z]|$)"
);
// Bare 978/979 runs common in scanned PDFs, unseparated and separated.
regex!(BARE_THIRTEEN, r"(?:^|[^0-9])(97[89][0-9]{10})(?:[^0-9]|$)");
regex!(BARE_THIRTEEN_SEP, &format!(r"(?:^|[^0-9])(97[89](?:{SEP}|[0-9]){{11,17}})(?:[^0-9]|$)"));

// OCR repair: corrupted "ISBN" label spellings and a leading O/I/l standing
// in for a digit at the start of a bare identifier.
regex!(LABEL_FIX, r"\b[Ii1l][Ss5][Bb8][Nn]\b");
regex!(LEADING_LOOKALIKE, r"(^|[^0-9A-Za-z])([OIl])([- ]?[0-9])");
// Digit runs following an ISBN label or a 97x prefix, possibly containing
// OCR lookalike characters in digit positions.
regex!(
    LABELLED_RUN,
    &format!(
        r"(?i)(ISBN{SEP}?(?:1[03])?{SEP}?:?\s*)([0-9OoIilSBZzGqQ](?:{SEP}|[0-9OoIilSBZzGqQ]){{8,17}}[0-9OoIilXx])"
    )
);
regex!(PREFIX_RUN, &format!(r"(97[89])((?:{SEP}|[0-9OoIilSBZzGqQ]){{10,16}})"));

/// A checksum-validated ISBN, canonically 13 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Isbn {
    thirteen: String,
    ten: Option<String>,
}

impl Isbn {
    /// Parse a raw identifier string, stripping separators and validating
    /// the check digit. Ten-digit inputs are upgraded to thirteen.
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = clean(raw);
        match cleaned.len() {
            13 if checksum_valid_13(&cleaned) => Ok(Self::from_thirteen(cleaned)),
            10 if checksum_valid_10(&cleaned) => Ok(Self::from_ten(cleaned)),
            _ => exn::bail!(ErrorKind::InvalidIdentifier(raw.to_string())),
        }
    }

    fn from_thirteen(digits: String) -> Self {
        Self { thirteen: digits, ten: None }
    }

    fn from_ten(digits: String) -> Self {
        Self {
            thirteen: upgrade_to_thirteen(&digits),
            ten: Some(digits),
        }
    }

    /// The canonical 13-digit form.
    pub fn as_str(&self) -> &str {
        &self.thirteen
    }

    /// The original 10-digit form, if the identifier was found as one.
    pub fn ten(&self) -> Option<&str> {
        self.ten.as_deref()
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.thirteen)
    }
}

impl FromStr for Isbn {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Strip everything that isn't a digit or the ISBN-10 check character.
fn clean(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x').map(|c| c.to_ascii_uppercase()).collect()
}

/// Weighted mod-10 check over all thirteen digits.
pub fn checksum_valid_13(digits: &str) -> bool {
    if digits.len() != 13 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let total: u32 = digits
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    total % 10 == 0
}

/// Mod-11 check with descending weights; `X` stands for ten in the check
/// position.
pub fn checksum_valid_10(digits: &str) -> bool {
    if digits.len() != 10 {
        return false;
    }
    let mut total = 0u32;
    for (i, c) in digits.chars().enumerate() {
        let value = match c {
            'X' | 'x' if i == 9 => 10,
            c if c.is_ascii_digit() => c as u32 - '0' as u32,
            _ => return false,
        };
        total += (10 - i as u32) * value;
    }
    total % 11 == 0
}

fn upgrade_to_thirteen(ten: &str) -> String {
    let raw = format!("978{}", &ten[..9]);
    let sum: u32 = raw
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    let check = (10 - sum % 10) % 10;
    format!("{raw}{check}")
}

/// Repair common OCR misreads before pattern matching. Substitutions are
/// only applied inside plausible identifier context so surrounding prose is
/// left alone.
fn repair_ocr(text: &str) -> String {
    let text = LABEL_FIX.replace_all(text, "ISBN");
    let text = LABELLED_RUN.replace_all(&text, |caps: &regex::Captures<'_>| {
        format!("{}{}", &caps[1], substitute_lookalikes(&caps[2]))
    });
    let text = PREFIX_RUN.replace_all(&text, |caps: &regex::Captures<'_>| {
        format!("{}{}", &caps[1], substitute_lookalikes(&caps[2]))
    });
    LEADING_LOOKALIKE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let digit = match &caps[2] {
                "O" => "0",
                _ => "1",
            };
            format!("{}{}{}", &caps[1], digit, &caps[3])
        })
        .into_owned()
}

fn substitute_lookalikes(run: &str) -> String {
    run.chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'I' | 'l' => '1',
            'S' => '5',
            'B' => '8',
            'Z' | 'z' => '2',
            'G' => '6',
            'q' | 'Q' => '9',
            other => other,
        })
        .collect()
}

/// Scan free text for the best identifier candidate.
///
/// Thirteen-digit candidates win over ten-digit ones; within a length class
/// the first checksum-valid occurrence wins. Candidates failing their check
/// digit are discarded, never returned.
pub fn scan_text(text: &str) -> Option<Isbn> {
    let text = repair_ocr(text);
    let mut ten: Option<String> = None;
    for caps in LABELLED.captures_iter(&text) {
        let cleaned = clean(&caps[1]);
        match cleaned.len() {
            13 if checksum_valid_13(&cleaned) => return Some(Isbn::from_thirteen(cleaned)),
            10 if checksum_valid_10(&cleaned) => ten.get_or_insert(cleaned),
            _ => continue,
        };
    }
    for pattern in [&*BARE_THIRTEEN, &*BARE_THIRTEEN_SEP] {
        for caps in pattern.captures_iter(&text) {
            let cleaned = clean(&caps[1]);
            if cleaned.len() == 13 && checksum_valid_13(&cleaned) {
                return Some(Isbn::from_thirteen(cleaned));
            }
        }
    }
    if ten.is_none() {
        for caps in BARE_TEN.captures_iter(&text) {
            let cleaned = clean(&caps[1]);
            if cleaned.len() == 10 && checksum_valid_10(&cleaned) {
                ten = Some(cleaned);
                break;
            }
        }
    }
    ten.map(Isbn::from_ten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("9783161484100", true)]
    #[case("9780306406157", true)]
    #[case("9790306406157", false)] // 979 prefix with a 978 check digit
    #[case("9783161484101", false)]
    #[case("978316148410", false)] // twelve digits
    #[case("978316148410a", false)]
    fn test_checksum_thirteen(#[case] digits: &str, #[case] valid: bool) {
        assert_eq!(checksum_valid_13(digits), valid);
    }

    #[rstest]
    #[case("0306406152", true)]
    #[case("067142517X", true)]
    #[case("0306406153", false)]
    #[case("030640615", false)]
    #[case("X306406152", false)] // X only valid in the check position
    fn test_checksum_ten(#[case] digits: &str, #[case] valid: bool) {
        assert_eq!(checksum_valid_10(digits), valid);
    }

    #[test]
    fn test_parse_normalizes_hyphenated_thirteen() {
        let isbn = Isbn::parse("978-3-16-148410-0").unwrap();
        assert_eq!(isbn.as_str(), "9783161484100");
        assert!(isbn.ten().is_none());
    }

    #[test]
    fn test_parse_upgrades_ten_to_thirteen() {
        let isbn = Isbn::parse("0-306-40615-2").unwrap();
        assert_eq!(isbn.as_str(), "9780306406157");
        assert_eq!(isbn.ten(), Some("0306406152"));
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        assert!(Isbn::parse("9783161484101").is_err());
        assert!(Isbn::parse("garbage").is_err());
    }

    #[test]
    fn test_scan_prefers_thirteen_over_ten() {
        let text = "ISBN 0-306-40615-2 \n ISBN 978-3-16-148410-0";
        let isbn = scan_text(text).unwrap();
        assert_eq!(isbn.as_str(), "9783161484100");
    }

    #[test]
    fn test_scan_labelled_ten() {
        let isbn = scan_text("ISBN: 0-671-42517-X").unwrap();
        assert_eq!(isbn.ten(), Some("067142517X"));
    }

    #[test]
    fn test_scan_bare_ten_requires_valid_check_digit() {
        assert!(scan_text("shipping code 0-671-42517-3").is_none());
        assert!(scan_text("0-671-42517-X on its own line").is_some());
    }

    #[test]
    fn test_scan_bare_thirteen_in_prose() {
        let isbn = scan_text("catalogued under 9780306406157 by the publisher").unwrap();
        assert_eq!(isbn.as_str(), "9780306406157");
    }

    #[test]
    fn test_scan_repairs_ocr_lookalikes() {
        // O read as zero, S as five, corrupted label spelling.
        let isbn = scan_text("l5BN 978-O-3O6-4O6l5-7").unwrap();
        assert_eq!(isbn.as_str(), "9780306406157");
    }

    #[test]
    fn test_scan_returns_revalidating_identifier() {
        // Whatever comes out of a scan must independently pass validation.
        let text = "ISBN-13: 978 0 306 40615 7";
        let isbn = scan_text(text).unwrap();
        assert!(checksum_valid_13(isbn.as_str()));
        assert!(Isbn::parse(isbn.as_str()).is_ok());
    }

    #[test]
    fn test_scan_nothing_found() {
        assert!(scan_text("no identifiers in this paragraph at all").is_none());
    }
}
