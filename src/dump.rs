//! Section dump parsing.
//!
//! Converts the textual hex dumps produced by the section-dump tool into a
//! sparse address -> byte map. The format is line oriented:
//!
//! ```text
//! a0000 1900028d 028d028d 028d028d 038d048d  ................
//! ```
//!
//! A hex address, whitespace-separated groups of hex digit pairs, and an
//! optional ASCII gutter. Lines whose first character is not a hex digit
//! are ignored, which also skips the tool's section headers and blank
//! lines.

use std::collections::BTreeMap;

/// Sparse image of the assembled sections, keyed by address.
///
/// Addresses need not be contiguous. A hole inside a requested range is a
/// hard extraction error, never a silent zero fill.
pub type MemoryImage = BTreeMap<u32, u8>;

/// Parse every section dump into one combined sparse image.
///
/// Sections are parsed independently; a byte parsed later overwrites an
/// earlier byte at the same address.
pub fn parse_section_dumps(dumps: &BTreeMap<String, String>) -> MemoryImage {
    let mut image = MemoryImage::new();
    for (section, text) in dumps {
        let before = image.len();
        parse_dump_into(&mut image, text);
        tracing::debug!(
            "section {}: {} new byte(s) parsed",
            section,
            image.len() - before
        );
    }
    image
}

/// Parse one dump text into an existing image.
pub fn parse_dump_into(image: &mut MemoryImage, text: &str) {
    for line in text.lines() {
        parse_line(image, line);
    }
}

fn parse_line(image: &mut MemoryImage, line: &str) {
    if !line.starts_with(|c: char| c.is_ascii_hexdigit()) {
        return;
    }
    let line = strip_ascii_gutter(line);

    let mut fields = line.split_whitespace();
    let Some(address_field) = fields.next() else {
        return;
    };
    let Ok(address) = u32::from_str_radix(address_field, 16) else {
        return;
    };

    let mut offset = 0u32;
    for group in fields {
        if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            // Gutter content that survived the strip ends the data portion.
            break;
        }
        // A trailing unpaired digit is discarded.
        for pair in 0..group.len() / 2 {
            let Ok(byte) = u8::from_str_radix(&group[2 * pair..2 * pair + 2], 16) else {
                continue;
            };
            image.insert(address.wrapping_add(offset), byte);
            offset += 1;
        }
    }
}

/// Cut the trailing ASCII gutter: a run of two or more spaces followed by
/// anything that is not hex data. Wide padding between hex columns is left
/// alone.
fn strip_ascii_gutter(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b' ' && bytes[i + 1] == b' ' {
            let rest = line[i..].trim_start_matches(' ');
            if !rest.is_empty() && !rest.bytes().all(|b| b.is_ascii_hexdigit() || b == b' ') {
                return &line[..i];
            }
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            continue;
        }
        i += 1;
    }
    line
}
