//! Text harvesting from MOBI/AZW Palm database files.
//!
//! Two strategies, cheapest first: the EXTH metadata block in record zero
//! often carries the ISBN outright; failing that, printable-text runs from
//! the head and tail of the file catch copyright pages in the (usually
//! LZ77-compressed but ASCII-leaky) text records.

use crate::text::printable_runs;

/// EXTH record type for the ISBN field.
const EXTH_ISBN: u32 = 104;
/// How much of each end of the file to sweep for printable runs.
const SWEEP_WINDOW: usize = 40 * 1024;
const MIN_RUN: usize = 6;

pub fn harvest(bytes: &[u8]) -> String {
    let mut text = String::new();
    if let Some(isbn) = exth_isbn(bytes) {
        // Label it so the identifier scanner treats it as authoritative.
        text.push_str("ISBN: ");
        text.push_str(&isbn);
        text.push('\n');
    }
    let head = &bytes[..bytes.len().min(SWEEP_WINDOW)];
    text.push_str(&printable_runs(head, MIN_RUN));
    if bytes.len() > SWEEP_WINDOW {
        let tail = &bytes[bytes.len() - SWEEP_WINDOW..];
        text.push('\n');
        text.push_str(&printable_runs(tail, MIN_RUN));
    }
    text
}

/// Walk the Palm database header to record zero and pull the ISBN out of its
/// EXTH block, if one exists. Any structural surprise bails to `None`; the
/// printable-run sweep still gets its chance.
fn exth_isbn(bytes: &[u8]) -> Option<String> {
    let num_records = be_u16(bytes, 76)? as usize;
    if num_records == 0 {
        return None;
    }
    // Record info list: 8 bytes per entry starting at offset 78.
    let rec0_start = be_u32(bytes, 78)? as usize;
    let rec0_end = if num_records > 1 {
        be_u32(bytes, 78 + 8)? as usize
    } else {
        bytes.len()
    };
    let rec0 = bytes.get(rec0_start..rec0_end.min(bytes.len()))?;

    if rec0.get(16..20)? != b"MOBI" {
        return None;
    }
    let header_len = be_u32(rec0, 20)? as usize;
    let exth_flags = be_u32(rec0, 128)?;
    if exth_flags & 0x40 == 0 {
        return None;
    }

    let exth = rec0.get(16 + header_len..)?;
    if exth.get(0..4)? != b"EXTH" {
        return None;
    }
    let count = be_u32(exth, 8)? as usize;
    let mut pos = 12;
    for _ in 0..count {
        let rec_type = be_u32(exth, pos)?;
        let rec_len = be_u32(exth, pos + 4)? as usize;
        if rec_len < 8 {
            return None;
        }
        if rec_type == EXTH_ISBN {
            let data = exth.get(pos + 8..pos + rec_len)?;
            return String::from_utf8(data.to_vec()).ok().map(|s| s.trim().to_string());
        }
        pos += rec_len;
    }
    None
}

fn be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes.get(offset..offset + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes.get(offset..offset + 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
