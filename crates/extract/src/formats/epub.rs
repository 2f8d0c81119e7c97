//! Text harvesting from EPUB containers.
//!
//! An EPUB is a zip archive whose `META-INF/container.xml` points at an OPF
//! package document. The package metadata is the richest hunting ground
//! (publishers put the ISBN in `dc:identifier`), followed by the first spine
//! documents and any non-spine files whose names suggest front matter.

use regex::Regex;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use zip::ZipArchive;

use crate::text::{strip_markup, truncate_to_boundary};

/// Cap on harvested text. Identifiers live in the front matter; reading a
/// whole novel buys nothing.
const TEXT_BUDGET: usize = 80_000;
const SPINE_FILE_LIMIT: usize = 15;
const FRONT_MATTER_FILE_LIMIT: usize = 10;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

regex!(ROOTFILE, r#"full-path\s*=\s*"([^"]+)""#);
regex!(IDENTIFIER, r"(?is)<dc:identifier[^>]*>\s*([^<]+?)\s*</dc:identifier>");
regex!(MANIFEST_ITEM, r#"(?is)<item\s[^>]*>"#);
regex!(ATTR_ID, r#"id\s*=\s*"([^"]+)""#);
regex!(ATTR_HREF, r#"href\s*=\s*"([^"]+)""#);
regex!(SPINE_REF, r#"(?is)<itemref\s[^>]*idref\s*=\s*"([^"]+)""#);

// Non-spine filenames worth reading anyway: publishers tuck the copyright
// page into files the spine never references.
const FRONT_MATTER_HINTS: &[&str] =
    &["copyright", "legal", "rights", "title", "colophon", "imprint", "prelim", "frontmatter"];

/// Harvest identifier-bearing text from EPUB bytes. Unparseable archives
/// yield an empty string rather than an error; a broken file is just a file
/// with nothing to say.
pub fn harvest(bytes: &[u8]) -> String {
    match try_harvest(bytes) {
        Some(text) => text,
        None => {
            tracing::debug!("not a readable epub container");
            String::new()
        }
    }
}

fn try_harvest(bytes: &[u8]) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).ok()?;
    let container = read_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = ROOTFILE.captures(&container)?.get(1)?.as_str().to_string();
    let opf = read_entry(&mut archive, &opf_path)?;
    let opf_dir = match opf_path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/"),
        None => String::new(),
    };

    let mut text = String::new();
    for caps in IDENTIFIER.captures_iter(&opf) {
        // Label the value so the identifier scanner sees it in context.
        text.push_str("ISBN: ");
        text.push_str(&caps[1]);
        text.push('\n');
    }
    text.push_str(&strip_markup(&opf));
    text.push('\n');

    let spine_paths = spine_document_paths(&opf, &opf_dir);
    let spine_set: HashSet<&str> = spine_paths.iter().map(String::as_str).collect();
    for path in spine_paths.iter().take(SPINE_FILE_LIMIT) {
        if text.len() >= TEXT_BUDGET {
            break;
        }
        if let Some(body) = read_entry(&mut archive, path) {
            text.push_str(&strip_markup(&body));
            text.push('\n');
        }
    }

    let front_matter: Vec<String> = archive
        .file_names()
        .filter(|name| !spine_set.contains(name) && looks_like_front_matter(name))
        .map(str::to_string)
        .take(FRONT_MATTER_FILE_LIMIT)
        .collect();
    for path in front_matter {
        if text.len() >= TEXT_BUDGET {
            break;
        }
        if let Some(body) = read_entry(&mut archive, &path) {
            text.push_str(&strip_markup(&body));
            text.push('\n');
        }
    }

    Some(truncate_to_boundary(&text, TEXT_BUDGET).to_string())
}

/// Manifest hrefs in spine order, resolved relative to the OPF directory.
fn spine_document_paths(opf: &str, opf_dir: &str) -> Vec<String> {
    let mut hrefs_by_id: Vec<(String, String)> = Vec::new();
    for item in MANIFEST_ITEM.find_iter(opf) {
        let tag = item.as_str();
        if let (Some(id), Some(href)) = (ATTR_ID.captures(tag), ATTR_HREF.captures(tag)) {
            hrefs_by_id.push((id[1].to_string(), format!("{opf_dir}{}", &href[1])));
        }
    }
    SPINE_REF
        .captures_iter(opf)
        .filter_map(|caps| {
            let idref = &caps[1];
            hrefs_by_id.iter().find(|(id, _)| id == idref).map(|(_, href)| href.clone())
        })
        .collect()
}

fn looks_like_front_matter(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    (lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm"))
        && FRONT_MATTER_HINTS.iter().any(|hint| lower.contains(hint))
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut body = String::new();
    entry.read_to_string(&mut body).ok()?;
    Some(body)
}
