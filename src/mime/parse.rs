//! Parsing of MIME entities from wire format.

use crate::{
    header::HeaderValue,
    mime::{flowed, MimeParseError},
    parse::{self, Line},
    quoted_printable, util,
};
use bstr::ByteSlice;
use std::fmt::{self, Debug, Formatter};

/// A parsed MIME entity.
///
/// The entity keeps its raw bytes, so that the exact content of a body part
/// (as covered by a detached signature) can be recovered.
#[derive(Clone, Eq, PartialEq)]
pub struct MimePart {
    raw: Vec<u8>,
    headers: Vec<(String, String)>,
    body_offset: usize,
    children: Vec<MimePart>,
}

impl MimePart {
    /// Parses an entity. CRLF, LF, and mixed line endings are accepted.
    pub fn parse(input: impl AsRef<[u8]>) -> Result<Self, MimeParseError> {
        let input = input.as_ref();
        if input.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(MimeParseError::EmptyInput);
        }
        Self::parse_entity(input)
    }

    fn parse_entity(input: &[u8]) -> Result<Self, MimeParseError> {
        let lines = parse::lines(input);

        // the header block ends at the first empty line
        let separator = lines.iter().position(|l| l.start == l.end);

        let (header_lines, body_offset) = match separator {
            Some(i) => (&lines[..i], lines[i].next),
            None => (&lines[..], input.len()),
        };

        let headers = parse_headers(input, header_lines);

        let mut part = Self {
            raw: input.to_vec(),
            headers,
            body_offset,
            children: vec![],
        };

        let content_type = part.content_type();
        if content_type.mime_type().starts_with("multipart/") {
            let boundary = content_type
                .param("boundary")
                .filter(|b| !b.is_empty())
                .ok_or(MimeParseError::MissingBoundary)?;
            part.children = split_multipart(part.body(), boundary)?
                .into_iter()
                .map(Self::parse_entity)
                .collect::<Result<_, _>>()?;
        }

        Ok(part)
    }

    /// The raw bytes of the entity, headers and body.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The headers in order of appearance, with unfolded values.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the first value of the header with the given name
    /// (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The parsed `Content-Type`, defaulting to `text/plain`.
    pub fn content_type(&self) -> HeaderValue {
        match self.header("Content-Type") {
            Some(value) if !value.trim().is_empty() => HeaderValue::parse(value),
            _ => HeaderValue::new("text/plain"),
        }
    }

    /// The lowercased `Content-Transfer-Encoding`, defaulting to `7bit`.
    pub fn transfer_encoding(&self) -> String {
        self.header("Content-Transfer-Encoding")
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "7bit".into())
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type().mime_type().starts_with("multipart/")
    }

    /// The raw, still encoded body.
    pub fn body(&self) -> &[u8] {
        &self.raw[self.body_offset..]
    }

    /// The body with the transfer encoding removed. Format=flowed text is
    /// unflowed.
    pub fn decoded_body(&self) -> Result<Vec<u8>, MimeParseError> {
        let body = self.body();

        let decoded = match self.transfer_encoding().as_str() {
            "base64" => {
                let s = body.to_str().map_err(|_| MimeParseError::InvalidTransferEncoding)?;
                util::decode_base64(s).map_err(|_| MimeParseError::InvalidTransferEncoding)?
            }
            "quoted-printable" => {
                let s = body.to_str().map_err(|_| MimeParseError::InvalidTransferEncoding)?;
                quoted_printable::decode(s).map_err(|_| MimeParseError::InvalidTransferEncoding)?
            }
            _ => body.to_vec(),
        };

        let content_type = self.content_type();
        let flowed = content_type.mime_type().starts_with("text/")
            && content_type
                .param("format")
                .map_or(false, |f| f.trim().eq_ignore_ascii_case("flowed"));

        if flowed {
            if let Ok(text) = std::str::from_utf8(&decoded) {
                return Ok(flowed::decode(text).into_bytes());
            }
        }

        Ok(decoded)
    }

    /// The child entities of a multipart entity.
    pub fn children(&self) -> &[MimePart] {
        &self.children
    }
}

impl Debug for MimePart {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MimePart")
            .field("headers", &self.headers)
            .field("body", &self.body().as_bstr())
            .field("children", &self.children)
            .finish()
    }
}

fn parse_headers(input: &[u8], lines: &[Line]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = vec![];

    for line in lines {
        let content = String::from_utf8_lossy(line.content(input));

        if content.starts_with(crate::parse::is_wsp) {
            // continuation of a folded header
            if let Some((_, value)) = headers.last_mut() {
                value.push_str(&content);
            }
            continue;
        }

        match content.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.push((name.trim().to_owned(), value.trim_start().to_owned()));
            }
            _ => {
                // not a header line, ignored
            }
        }
    }

    for (_, value) in &mut headers {
        let trimmed = value.trim_end().len();
        value.truncate(trimmed);
    }

    headers
}

// Returns the raw bytes of each body part. The line break before a delimiter
// line belongs to the delimiter, not to the preceding part.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>, MimeParseError> {
    let delimiter = format!("--{boundary}");

    let mut parts = vec![];
    let mut part_start = None;
    let mut closed = false;

    for line in parse::lines(body) {
        let content = line.content(body);

        let Some(rest) = content.strip_prefix(delimiter.as_bytes()) else { continue };
        let is_close = rest.starts_with(b"--");
        let rest = if is_close { &rest[2..] } else { rest };
        if !rest.iter().all(|&b| b == b' ' || b == b'\t') {
            continue;
        }

        if let Some(start) = part_start {
            let end = line.start - parse::line_break_before(body, line.start);
            parts.push(&body[start..end.max(start)]);
        }

        if is_close {
            closed = true;
            break;
        }

        part_start = Some(line.next);
    }

    // tolerate a missing close delimiter
    if !closed {
        if let Some(start) = part_start {
            parts.push(&body[start..]);
        }
    }

    if part_start.is_none() {
        return Err(MimeParseError::MissingBoundary);
    }

    Ok(parts)
}
