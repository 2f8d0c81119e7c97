//! Small text utilities shared by the format extractors.

/// Replace markup tags with spaces and collapse whitespace, leaving only the
/// rendered text of an XML/HTML fragment. Good enough for hunting
/// identifiers; not a real parser.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_space = false;
    for c in input.chars() {
        if c == '\n' {
            out.push('\n');
            last_space = true;
        } else if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Pull runs of printable ASCII (plus newline) out of binary data. Runs
/// shorter than `min_len` are noise and skipped.
pub fn printable_runs(bytes: &[u8], min_len: usize) -> String {
    let mut out = String::new();
    let mut run = String::new();
    for &b in bytes {
        if (0x20..0x7f).contains(&b) || b == b'\n' {
            run.push(b as char);
        } else if run.len() >= min_len {
            out.push_str(&run);
            out.push('\n');
            run.clear();
        } else {
            run.clear();
        }
    }
    if run.len() >= min_len {
        out.push_str(&run);
    }
    out
}

/// Truncate to at most `max_bytes`, backing off to a char boundary so the
/// result is still valid UTF-8 to slice.
pub fn truncate_to_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Fraction of characters that are ASCII letters. Scanned-image PDFs yield
/// text extractions that are nearly all whitespace and control junk.
pub fn alpha_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let alpha = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    alpha as f64 / text.chars().count() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup() {
        let html = "<p>ISBN <b>978-3-16-148410-0</b></p>";
        assert_eq!(strip_markup(html), " ISBN 978-3-16-148410-0 ");
    }

    #[test]
    fn test_printable_runs_skips_binary() {
        let mut bytes = vec![0u8, 1, 2];
        bytes.extend_from_slice(b"ISBN: 9783161484100");
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"ab"); // below threshold, dropped
        bytes.push(0);
        let text = printable_runs(&bytes, 4);
        assert!(text.contains("ISBN: 9783161484100"));
        assert!(!text.contains("ab"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "caf\u{e9}s"; // 'é' is two bytes starting at index 3
        assert_eq!(truncate_to_boundary(text, 4), "caf");
        assert_eq!(truncate_to_boundary(text, 5), "caf\u{e9}");
        assert_eq!(truncate_to_boundary(text, 100), text);
    }

    #[test]
    fn test_alpha_ratio() {
        assert!(alpha_ratio("mostly words here") > 0.5);
        assert!(alpha_ratio("   \n\n  1 2 3 ") < 0.2);
        assert_eq!(alpha_ratio(""), 0.0);
    }
}
