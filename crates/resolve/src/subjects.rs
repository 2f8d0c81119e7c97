//! Subject list hygiene.
//!
//! Sources hand back subject headings full of junk: duplicates differing only
//! in case, entire call numbers, catalogue codes, and paragraph-length
//! strings. Clean them once, before anything is stored.

use regex::Regex;
use std::sync::LazyLock;

const MAX_SUBJECTS: usize = 8;
const MAX_SUBJECT_LEN: usize = 60;

// Call-number-like ("QA76.73") and code-like ("005.13/3") strings are
// classifications leaking into the subject field, not subjects.
static CALL_NUMBER_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,3}\s?\d|^\d{3}(\.\d+)?(/|$)").unwrap());

pub fn clean_subjects<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for subject in raw {
        let subject = subject.as_ref().trim().trim_end_matches('.');
        if subject.is_empty() || subject.len() > MAX_SUBJECT_LEN {
            continue;
        }
        if CALL_NUMBER_LIKE.is_match(subject) {
            continue;
        }
        let folded = subject.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(subject.to_string());
        if out.len() == MAX_SUBJECTS {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupes_case_insensitively() {
        let cleaned = clean_subjects(["History", "history", "HISTORY", "Art"]);
        assert_eq!(cleaned, vec!["History".to_string(), "Art".to_string()]);
    }

    #[test]
    fn test_drops_classification_leakage() {
        let cleaned = clean_subjects(["QA76.73.R87", "005.13/3", "Programming languages"]);
        assert_eq!(cleaned, vec!["Programming languages".to_string()]);
    }

    #[test]
    fn test_caps_count_and_length() {
        let long = "x".repeat(80);
        let many: Vec<String> = (0..12).map(|i| format!("Subject {i}")).collect();
        let mut input = vec![long];
        input.extend(many);
        let cleaned = clean_subjects(&input);
        assert_eq!(cleaned.len(), 8);
        assert_eq!(cleaned[0], "Subject 0");
    }
}
