// viasmime – S/MIME messaging with DANE certificate discovery
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Quoted-Printable encoding.
//!
//! See RFC 2045, section 6.7, and for the header variant (the *Q* encoding of
//! encoded words) RFC 2047, section 4.2.

use std::{
    error::Error,
    fmt::{self, Display, Formatter, Write},
};

/// Maximum length of an encoded line, not counting the line break.
pub const LINE_WIDTH: usize = 76;

/// Encodes bytes as a Quoted-Printable body.
///
/// Line breaks (CRLF or LF) in the input are hard line breaks and are emitted
/// as CRLF. Lines longer than 76 characters are broken with soft line breaks.
pub fn encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() + bytes.len() / 3);

    let mut lines = bytes.split(|&b| b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        encode_line(&mut result, line);
        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

fn encode_line(result: &mut String, line: &[u8]) {
    let mut width = 0;

    for (i, &b) in line.iter().enumerate() {
        let last = i + 1 == line.len();

        // Whitespace at the end of a line would be lost in transport.
        let literal = match b {
            b' ' | b'\t' => !last,
            b'=' => false,
            b'!'..=b'~' => true,
            _ => false,
        };

        let len = if literal { 1 } else { 3 };

        // Leave room for the soft line break `=`, unless this is the final
        // token on the line.
        let limit = if last { LINE_WIDTH } else { LINE_WIDTH - 1 };
        if width + len > limit {
            result.push_str("=\r\n");
            width = 0;
        }

        if literal {
            result.push(char::from(b));
        } else {
            write!(result, "={b:02X}").unwrap();
        }
        width += len;
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct QuotedPrintableError;

impl Display for QuotedPrintableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode Quoted-Printable data")
    }
}

impl Error for QuotedPrintableError {}

/// Decodes a Quoted-Printable body.
///
/// Soft line breaks are removed, hard line breaks are preserved as found
/// (CRLF or LF). Trailing whitespace on encoded lines is dropped.
pub fn decode(s: &str) -> Result<Vec<u8>, QuotedPrintableError> {
    let mut result = Vec::with_capacity(s.len());

    let mut lines = s.split('\n').peekable();

    while let Some(line) = lines.next() {
        let has_cr = line.ends_with('\r');
        let line = line.strip_suffix('\r').unwrap_or(line);
        let line = line.trim_end_matches(|c| c == ' ' || c == '\t');

        let soft_break = decode_line(&mut result, line)?;

        if !soft_break && lines.peek().is_some() {
            if has_cr {
                result.push(b'\r');
            }
            result.push(b'\n');
        }
    }

    Ok(result)
}

// Returns whether the line ended in a soft line break.
fn decode_line(result: &mut Vec<u8>, line: &str) -> Result<bool, QuotedPrintableError> {
    let mut bytes = line.as_bytes();

    while let Some((&b, rest)) = bytes.split_first() {
        if b == b'=' {
            match rest {
                [] => return Ok(true),
                [d1, d2, rest @ ..] if d1.is_ascii_hexdigit() && d2.is_ascii_hexdigit() => {
                    result.push(u8_from_digits(*d1, *d2));
                    bytes = rest;
                }
                _ => return Err(QuotedPrintableError),
            }
        } else {
            result.push(b);
            bytes = rest;
        }
    }

    Ok(false)
}

/// Encodes bytes with the *Q* encoding used in RFC 2047 encoded words.
pub fn encode_q(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());

    for &b in bytes {
        match b {
            b' ' => result.push('_'),
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                result.push(char::from(b));
            }
            _ => {
                write!(result, "={b:02X}").unwrap();
            }
        }
    }

    result
}

/// Decodes the text of an RFC 2047 *Q*-encoded word.
pub fn decode_q(s: &str) -> Result<Vec<u8>, QuotedPrintableError> {
    let s = s.replace('_', " ");
    let mut result = Vec::with_capacity(s.len());
    match decode_line(&mut result, &s)? {
        true => Err(QuotedPrintableError),
        false => Ok(result),
    }
}

fn u8_from_digits(c1: u8, c2: u8) -> u8 {
    // Only uppercase hex digits are allowed in Quoted-Printable, but there is
    // no harm in accepting lowercase, too.
    fn to_u8(c: u8) -> u8 {
        match c {
            b'0'..=b'9' => c - b'0',
            b'A'..=b'F' => c - b'A' + 0xa,
            b'a'..=b'f' => c - b'a' + 0xa,
            _ => unreachable!(),
        }
    }

    debug_assert!(c1.is_ascii_hexdigit() && c2.is_ascii_hexdigit());

    to_u8(c1) * 0x10 + to_u8(c2)
}
