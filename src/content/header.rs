//! Header/body splitting for post and comment files
//!
//! A content file starts with a block of `key: value` lines. The block ends at
//! the first line without a colon; that line and everything after it is the
//! body. Keys are lowercased and trimmed, values are trimmed. Which keys mean
//! anything is decided by the caller.

use std::borrow::Cow;

/// One `key: value` line from a header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine {
    /// Lowercased, trimmed text before the first colon
    pub key: String,
    /// Trimmed text after the first colon
    pub value: String,
}

/// A content file split into its header block and body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub headers: Vec<HeaderLine>,
    pub body: String,
}

/// Removes every carriage return so CRLF files parse like LF files.
pub fn strip_carriage_returns(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace('\r', ""))
    } else {
        Cow::Borrowed(text)
    }
}

/// Splits raw file text into header lines and body.
///
/// Never fails: text without a header yields an empty header list and the
/// whole text as body.
pub fn split_document(raw: &str) -> Document {
    let text = strip_carriage_returns(raw);
    let mut headers = Vec::new();
    let mut consumed = 0;

    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        match parse_header_line(content) {
            Some(header) => {
                headers.push(header);
                consumed += line.len();
            }
            None => break,
        }
    }

    Document {
        headers,
        body: text[consumed..].to_string(),
    }
}

/// Parses a single `key: value` line, or `None` if the line has no colon.
pub fn parse_header_line(line: &str) -> Option<HeaderLine> {
    let (key, value) = line.split_once(':')?;
    Some(HeaderLine {
        key: key.trim().to_lowercase(),
        value: value.trim().to_string(),
    })
}
