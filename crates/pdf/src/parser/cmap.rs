//! Minimal `/ToUnicode` CMap parser.
//!
//! Only the `bfchar` and `bfrange` sections matter for text extraction; the
//! codespace ranges and CID system info are ignored.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Character code to Unicode text.
pub type CMap = HashMap<u32, String>;

/// Upper bound on codes expanded from a single `bfrange` entry.
const MAX_RANGE_LEN: u32 = 0xFFFF;

fn bfchar_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap())
}

fn bfrange_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap())
}

fn bfchar_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>").unwrap())
}

fn bfrange_entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"<([0-9A-Fa-f\s]*)>\s*<([0-9A-Fa-f\s]*)>\s*(?:<([0-9A-Fa-f\s]*)>|\[([^\]]*)\])",
        )
        .unwrap()
    })
}

fn hex_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<([0-9A-Fa-f\s]*)>").unwrap())
}

/// Parse a ToUnicode stream into a code-to-text map.
///
/// Malformed entries are skipped; an unparseable stream yields an empty map.
pub fn parse_to_unicode(data: &[u8]) -> CMap {
    let text = String::from_utf8_lossy(data);
    let mut map = CMap::new();

    for section in bfchar_section_re().captures_iter(&text) {
        for entry in bfchar_entry_re().captures_iter(&section[1]) {
            if let (Some(code), Some(dst)) = (parse_code(&entry[1]), decode_utf16_hex(&entry[2])) {
                map.insert(code, dst);
            }
        }
    }

    for section in bfrange_section_re().captures_iter(&text) {
        for entry in bfrange_entry_re().captures_iter(&section[1]) {
            let (Some(lo), Some(hi)) = (parse_code(&entry[1]), parse_code(&entry[2])) else {
                continue;
            };
            if hi < lo || hi - lo > MAX_RANGE_LEN {
                continue;
            }

            if let Some(dst) = entry.get(3) {
                let Some(units) = hex_to_utf16(dst.as_str()) else {
                    continue;
                };
                for (offset, code) in (lo..=hi).enumerate() {
                    if let Some(text) = offset_units(&units, offset as u32) {
                        map.insert(code, text);
                    }
                }
            } else if let Some(list) = entry.get(4) {
                let targets = hex_string_re()
                    .captures_iter(list.as_str())
                    .filter_map(|c| decode_utf16_hex(&c[1]));
                for (code, text) in (lo..=hi).zip(targets) {
                    map.insert(code, text);
                }
            }
        }
    }

    map
}

fn strip_ws(hex: &str) -> String {
    hex.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_code(hex: &str) -> Option<u32> {
    let hex = strip_ws(hex);
    if hex.is_empty() || hex.len() > 8 {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

fn hex_to_utf16(hex: &str) -> Option<Vec<u16>> {
    let hex = strip_ws(hex);
    if hex.is_empty() {
        return None;
    }

    // Odd-length destinations are padded on the right, as for PDF hex strings.
    let padded = if hex.len() % 4 == 0 {
        hex
    } else {
        let pad = 4 - hex.len() % 4;
        format!("{}{}", hex, "0".repeat(pad))
    };

    padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| u16::from_str_radix(s, 16).ok())
        })
        .collect()
}

fn decode_utf16_hex(hex: &str) -> Option<String> {
    let units = hex_to_utf16(hex)?;
    Some(String::from_utf16_lossy(&units))
}

/// Add `offset` to the last UTF-16 unit of a range destination.
fn offset_units(units: &[u16], offset: u32) -> Option<String> {
    let mut units = units.to_vec();
    let last = units.last_mut()?;
    *last = u16::try_from(u32::from(*last) + offset).ok()?;
    Some(String::from_utf16_lossy(&units))
}
