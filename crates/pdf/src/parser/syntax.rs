//! Structural check of raw content-stream bytes.
//!
//! `lopdf::content::Content::decode` stops quietly at the first token it
//! cannot read and returns the operations before it.  [`check_content_syntax`]
//! walks the same bytes with the PDF lexical rules (strings, hex strings,
//! arrays, dictionaries, comments, inline image data) so that a stream that
//! would be truncated is rejected instead.

use crate::PdfError;

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\0')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn syntax_error(offset: usize, reason: &str) -> PdfError {
    PdfError::Parse(format!(
        "malformed content stream at byte {}: {}",
        offset, reason
    ))
}

/// Index just past the `)` closing the literal string that opens at `start`.
fn skip_literal_string(data: &[u8], start: usize) -> Result<usize, PdfError> {
    let mut depth = 0usize;
    let mut i = start;
    while i < data.len() {
        match data[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(syntax_error(start, "unterminated string"))
}

/// Index just past the `>` closing the hex string that opens at `start`.
fn skip_hex_string(data: &[u8], start: usize) -> Result<usize, PdfError> {
    for (i, &byte) in data.iter().enumerate().skip(start + 1) {
        if byte == b'>' {
            return Ok(i + 1);
        }
        if !byte.is_ascii_hexdigit() && !is_whitespace(byte) {
            return Err(syntax_error(i, "invalid byte in hex string"));
        }
    }
    Err(syntax_error(start, "unterminated hex string"))
}

/// Index just past the `EI` ending inline image data that follows the `ID`
/// keyword ending at `start`.
fn skip_inline_image(data: &[u8], start: usize) -> Result<usize, PdfError> {
    let mut i = start + 1;
    while i + 2 <= data.len() {
        let ends_here = is_whitespace(data[i - 1])
            && &data[i..i + 2] == b"EI"
            && data.get(i + 2).map_or(true, |b| is_whitespace(*b));
        if ends_here {
            return Ok(i + 2);
        }
        i += 1;
    }
    Err(syntax_error(start, "inline image without EI"))
}

/// Reject content streams that a lenient decoder would silently truncate:
/// unterminated strings, unbalanced arrays or dictionaries, stray closing
/// delimiters and braces.
pub fn check_content_syntax(data: &[u8]) -> Result<(), PdfError> {
    let mut arrays = 0usize;
    let mut dicts = 0usize;
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        match byte {
            b'%' => {
                while i < data.len() && !matches!(data[i], b'\n' | b'\r') {
                    i += 1;
                }
            }
            b'(' => i = skip_literal_string(data, i)?,
            b'<' if data.get(i + 1) == Some(&b'<') => {
                dicts += 1;
                i += 2;
            }
            b'<' => i = skip_hex_string(data, i)?,
            b'>' if data.get(i + 1) == Some(&b'>') => {
                if dicts == 0 {
                    return Err(syntax_error(i, "unbalanced '>>'"));
                }
                dicts -= 1;
                i += 2;
            }
            b'[' => {
                arrays += 1;
                i += 1;
            }
            b']' => {
                if arrays == 0 {
                    return Err(syntax_error(i, "unbalanced ']'"));
                }
                arrays -= 1;
                i += 1;
            }
            b')' | b'>' | b'{' | b'}' => {
                return Err(syntax_error(i, &format!("unexpected '{}'", byte as char)));
            }
            _ if is_whitespace(byte) => i += 1,
            _ => {
                // Names start with '/'; everything else is a number or keyword.
                let start = i;
                i += 1;
                while i < data.len() && !is_whitespace(data[i]) && !is_delimiter(data[i]) {
                    i += 1;
                }
                if &data[start..i] == b"ID" {
                    i = skip_inline_image(data, i)?;
                }
            }
        }
    }

    if arrays > 0 || dicts > 0 {
        return Err(syntax_error(data.len(), "unclosed array or dictionary"));
    }
    Ok(())
}
