//! Representation of email header data.
//!
//! Header keys are normalised to a canonical spelling, structured values such
//! as `Content-Type` are parsed into a value and a parameter list, and
//! non-ASCII text is carried in RFC 2047 encoded words.

use crate::{mime::address, parse::is_wsp, quoted_printable};
use std::fmt::Write;

/// Preferred maximum length of header lines.
pub const LINE_WIDTH: usize = 76;

/// Normalises a header key to its canonical spelling.
///
/// Each dash-separated word is capitalised; the prefixes `MIME` and `DKIM`
/// and the suffixes `ID`, `SPF`, `FBL` and `MD5` are all uppercase.
///
/// ```
/// use viasmime::header::normalize_key;
///
/// assert_eq!(normalize_key("content-type"), "Content-Type");
/// assert_eq!(normalize_key("MESSAGE-ID"), "Message-ID");
/// assert_eq!(normalize_key("mime-version"), "MIME-Version");
/// ```
pub fn normalize_key(key: &str) -> String {
    let key = key.replace(|c| c == '\r' || c == '\n', " ");
    let key = key.trim().to_ascii_lowercase();

    if key == "x-smtpapi" {
        return "X-SMTPAPI".into();
    }

    let words: Vec<_> = key.split('-').collect();
    let last = words.len() - 1;

    let mut result = String::with_capacity(key.len());

    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            result.push('-');
        }
        let upper = (i == 0 && matches!(*word, "mime" | "dkim"))
            || (i > 0 && i == last && matches!(*word, "id" | "spf" | "fbl" | "md5"));
        if upper {
            result.push_str(&word.to_ascii_uppercase());
        } else {
            let mut chars = word.chars();
            if let Some(c) = chars.next() {
                result.push(c.to_ascii_uppercase());
                result.push_str(chars.as_str());
            }
        }
    }

    result
}

/// A structured header value with parameters, as in `Content-Type` and
/// `Content-Disposition`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HeaderValue {
    pub value: String,
    pub params: Vec<(String, String)>,
}

impl HeaderValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            params: vec![],
        }
    }

    /// Parses a structured header value. Parameter names are lowercased,
    /// quoted values unquoted, and RFC 2231 extended and continued parameters
    /// are reassembled. Malformed input is accepted on a best-effort basis.
    pub fn parse(s: &str) -> Self {
        let s = crate::parse::unfold(s);
        let segments = split_unquoted(&s, ';');

        let mut segments = segments.into_iter();
        let value = segments.next().unwrap_or_default().trim().to_owned();

        let mut raw_params: Vec<(String, String)> = vec![];
        for segment in segments {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (name, value) = match segment.split_once('=') {
                Some((name, value)) => (name.trim(), unquote(value.trim())),
                None => (segment, String::new()),
            };
            raw_params.push((name.to_ascii_lowercase(), value));
        }

        Self {
            value,
            params: join_extended_params(raw_params),
        }
    }

    /// Returns the first parameter with the given (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a parameter, replacing an existing one with the same name.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value,
            None => self.params.push((name.to_ascii_lowercase(), value)),
        }
    }

    /// Returns the lowercased value, for example `multipart/signed`.
    pub fn mime_type(&self) -> String {
        self.value.trim().to_ascii_lowercase()
    }

    /// Formats the value with its parameters. Parameter values are quoted
    /// where necessary; non-ASCII values use the RFC 2231 extended notation.
    pub fn build(&self) -> String {
        let mut result = self.value.clone();

        for (name, value) in &self.params {
            result.push_str("; ");
            if value.is_ascii() {
                if needs_quoting(value) {
                    write!(result, "{name}=\"{}\"", escape_quoted(value)).unwrap();
                } else {
                    write!(result, "{name}={value}").unwrap();
                }
            } else {
                write!(result, "{name}*=utf-8''{}", percent_encode(value)).unwrap();
            }
        }

        result
    }
}

// splits on a separator outside of quoted strings
fn split_unquoted(s: &str, sep: char) -> Vec<String> {
    let mut result = vec![];
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if quoted && c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == '"' {
            current.push(c);
            quoted = !quoted;
        } else if c == sep && !quoted {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    result.push(current);

    result
}

fn unquote(s: &str) -> String {
    match s.strip_prefix('"') {
        Some(inner) => {
            let inner = inner.strip_suffix('"').unwrap_or(inner);
            let mut result = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(c) = chars.next() {
                        result.push(c);
                    }
                } else {
                    result.push(c);
                }
            }
            result
        }
        None => s.to_owned(),
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value.chars().any(|c| {
            c.is_ascii_control()
                || is_wsp(c)
                || matches!(
                    c,
                    '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
                )
        })
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn percent_encode(value: &str) -> String {
    let mut result = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            result.push(char::from(b));
        } else {
            write!(result, "%{b:02X}").unwrap();
        }
    }
    result
}

fn percent_decode(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    while let Some((&b, rest)) = bytes.split_first() {
        match rest {
            [d1, d2, rest @ ..] if b == b'%' && d1.is_ascii_hexdigit() && d2.is_ascii_hexdigit() => {
                let digits = [*d1, *d2];
                let hex = std::str::from_utf8(&digits).unwrap();
                result.push(u8::from_str_radix(hex, 16).unwrap());
                bytes = rest;
            }
            _ => {
                result.push(b);
                bytes = rest;
            }
        }
    }
    result
}

// Reassembles RFC 2231 parameters: `name*=charset'lang'value`, and
// continuations `name*0`, `name*1*`, ...
fn join_extended_params(raw: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut result: Vec<(String, Vec<(usize, String, bool)>)> = vec![];

    for (name, value) in raw {
        let (base, index, extended) = match name.split_once('*') {
            Some((base, rest)) => {
                let extended = rest.ends_with('*') || rest.is_empty();
                let index = rest.trim_end_matches('*').parse().unwrap_or(0);
                (base.to_owned(), index, extended)
            }
            None => (name, 0, false),
        };

        match result.iter_mut().find(|(n, _)| *n == base) {
            Some((_, segments)) => segments.push((index, value, extended)),
            None => result.push((base, vec![(index, value, extended)])),
        }
    }

    result
        .into_iter()
        .map(|(name, mut segments)| {
            segments.sort_by_key(|(i, _, _)| *i);

            let mut bytes = vec![];
            for (i, value, extended) in segments {
                if extended {
                    let value = if i == 0 {
                        // strip charset and language
                        value.splitn(3, '\'').nth(2).unwrap_or(&value).to_owned()
                    } else {
                        value
                    };
                    bytes.extend(percent_decode(&value));
                } else {
                    bytes.extend(value.bytes());
                }
            }

            (name, String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect()
}

/// Encodes a header value for output: address headers get encoded display
/// names and IDNA domains, message identifiers are enclosed in angle
/// brackets, and any other non-ASCII text becomes encoded words.
pub fn encode_header_value(key: &str, value: &str) -> String {
    match normalize_key(key).as_str() {
        "From" | "Sender" | "To" | "Cc" | "Bcc" | "Reply-To" => {
            address::encode_address_list(value)
        }
        "Message-ID" | "In-Reply-To" | "Content-ID" => {
            let value = crate::parse::unfold(value);
            let value = value.trim();
            if value.is_empty() {
                String::new()
            } else if value.starts_with('<') {
                value.to_owned()
            } else {
                format!("<{value}>")
            }
        }
        "References" => crate::parse::unfold(value)
            .split_whitespace()
            .map(|id| {
                if id.starts_with('<') {
                    id.to_owned()
                } else {
                    format!("<{id}>")
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => encode_words(&crate::parse::unfold(value)),
    }
}

/// Encodes the non-ASCII part of a text as RFC 2047 encoded words. ASCII text
/// is returned unchanged.
pub fn encode_words(value: &str) -> String {
    if value.is_ascii() {
        return value.to_owned();
    }

    // Encode the span from the first to the last word containing non-ASCII
    // characters, keep surrounding ASCII words readable.
    let words: Vec<_> = value.split(' ').collect();
    let first = words.iter().position(|w| !w.is_ascii()).unwrap_or(0);
    let last = words.iter().rposition(|w| !w.is_ascii()).unwrap_or(words.len() - 1);

    let mut parts = vec![];
    if first > 0 {
        parts.push(words[..first].join(" "));
    }
    parts.push(encode_word(&words[first..=last].join(" ")));
    if last + 1 < words.len() {
        parts.push(words[last + 1..].join(" "));
    }

    parts.join(" ")
}

/// Encodes text as one or more `=?UTF-8?Q?...?=` words, none of them longer
/// than 75 characters, never splitting a UTF-8 sequence.
pub fn encode_word(text: &str) -> String {
    const PREFIX: &str = "=?UTF-8?Q?";
    const SUFFIX: &str = "?=";
    const MAX_PAYLOAD: usize = 75 - PREFIX.len() - SUFFIX.len();

    let mut words = vec![];
    let mut current = String::new();

    for c in text.chars() {
        let mut buf = [0; 4];
        let encoded = quoted_printable::encode_q(c.encode_utf8(&mut buf).as_bytes());
        if current.len() + encoded.len() > MAX_PAYLOAD {
            words.push(format!("{PREFIX}{current}{SUFFIX}"));
            current.clear();
        }
        current.push_str(&encoded);
    }
    words.push(format!("{PREFIX}{current}{SUFFIX}"));

    words.join(" ")
}

/// Decodes RFC 2047 encoded words in a header value. Words that cannot be
/// decoded are left as they are.
pub fn decode_words(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        match decode_word(candidate) {
            Some((decoded, len)) => {
                // whitespace between adjacent encoded words is dropped
                if !(last_was_word && before.chars().all(is_wsp)) {
                    result.push_str(before);
                }
                result.push_str(&decoded);
                rest = &candidate[len..];
                last_was_word = true;
            }
            None => {
                result.push_str(before);
                result.push_str("=?");
                rest = &candidate[2..];
                last_was_word = false;
            }
        }
    }
    result.push_str(rest);

    result
}

// Decodes one `=?charset?enc?text?=` word at the start of `s`, returning the
// text and the length consumed.
fn decode_word(s: &str) -> Option<(String, usize)> {
    let inner = s.strip_prefix("=?")?;
    let (charset, inner) = inner.split_once('?')?;
    let (encoding, inner) = inner.split_once('?')?;
    let end = inner.find("?=")?;
    let text = &inner[..end];

    if text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match encoding {
        "Q" | "q" => quoted_printable::decode_q(text).ok()?,
        "B" | "b" => crate::util::decode_base64(text).ok()?,
        _ => return None,
    };

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;

    // RFC 2231 allows a language suffix, as in `UTF-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let decoded = if charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii") {
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        // ISO-8859-1 and friends: map bytes to code points
        bytes.iter().map(|&b| char::from(b)).collect()
    };

    Some((decoded, consumed))
}

/// Folds a header line at whitespace so that lines do not exceed the given
/// width where possible. Continuation lines start with the whitespace the
/// line was broken at.
pub fn fold_line(line: &str, width: usize) -> String {
    let mut result = String::with_capacity(line.len() + line.len() / width * 3);
    let mut rest = line;

    // never break directly after the field name
    let mut min_break = line.find(": ").map_or(0, |i| i + 1);

    while rest.chars().count() > width {
        // candidate break points: whitespace not at the very start
        let breaks: Vec<_> = rest
            .char_indices()
            .skip(1)
            .filter(|&(i, c)| is_wsp(c) && i > min_break)
            .map(|(i, _)| i)
            .collect();
        min_break = 0;

        let limit = rest.char_indices().nth(width).map_or(rest.len(), |(i, _)| i);

        let at = breaks
            .iter()
            .rev()
            .find(|&&i| i <= limit)
            .or_else(|| breaks.first())
            .copied();

        match at {
            // avoid producing a whitespace-only first line
            Some(i) if !rest[..i].trim().is_empty() => {
                let (head, tail) = rest.split_at(i);
                result.push_str(head);
                result.push_str("\r\n");
                rest = tail;
            }
            _ => break,
        }
    }
    result.push_str(rest);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_key_ok() {
        assert_eq!(normalize_key("content-type"), "Content-Type");
        assert_eq!(normalize_key("CONTENT-TRANSFER-ENCODING"), "Content-Transfer-Encoding");
        assert_eq!(normalize_key("message-id"), "Message-ID");
        assert_eq!(normalize_key("Message-Id"), "Message-ID");
        assert_eq!(normalize_key("mime-version"), "MIME-Version");
        assert_eq!(normalize_key("dkim-signature"), "DKIM-Signature");
        assert_eq!(normalize_key("content-md5"), "Content-MD5");
        assert_eq!(normalize_key(" x-mailer "), "X-Mailer");
        assert_eq!(normalize_key("bcc"), "Bcc");
    }

    #[test]
    fn header_value_parse() {
        let v = HeaderValue::parse("multipart/signed; protocol=\"application/pkcs7-signature\";\r\n micalg=sha-256; BOUNDARY=\"a;b\"");
        assert_eq!(v.value, "multipart/signed");
        assert_eq!(v.param("protocol"), Some("application/pkcs7-signature"));
        assert_eq!(v.param("micalg"), Some("sha-256"));
        assert_eq!(v.param("boundary"), Some("a;b"));
        assert_eq!(v.param("charset"), None);
    }

    #[test]
    fn header_value_parse_extended() {
        let v = HeaderValue::parse("attachment; filename*=utf-8''gr%C3%BC%C3%9Fe.txt");
        assert_eq!(v.param("filename"), Some("grüße.txt"));

        let v = HeaderValue::parse("attachment; filename*0=\"long\"; filename*1=\"name.txt\"");
        assert_eq!(v.param("filename"), Some("longname.txt"));
    }

    #[test]
    fn header_value_build() {
        let mut v = HeaderValue::new("text/plain");
        v.set_param("charset", "utf-8");
        v.set_param("name", "my file.txt");
        assert_eq!(v.build(), "text/plain; charset=utf-8; name=\"my file.txt\"");

        v.set_param("Charset", "us-ascii");
        assert_eq!(v.build(), "text/plain; charset=us-ascii; name=\"my file.txt\"");

        let mut v = HeaderValue::new("attachment");
        v.set_param("filename", "grüße.txt");
        assert_eq!(v.build(), "attachment; filename*=utf-8''gr%C3%BC%C3%9Fe.txt");
        assert_eq!(HeaderValue::parse(&v.build()), v);
    }

    #[test]
    fn encode_words_ok() {
        assert_eq!(encode_words("plain"), "plain");
        assert_eq!(encode_words("Hello Jörg!"), "Hello =?UTF-8?Q?J=C3=B6rg!?=");
        assert_eq!(decode_words("Hello =?UTF-8?Q?J=C3=B6rg!?="), "Hello Jörg!");

        let long = "ü".repeat(40);
        let encoded = encode_words(&long);
        assert!(encoded.split(' ').all(|w| w.len() <= 75));
        assert_eq!(decode_words(&encoded), long);
    }

    #[test]
    fn encode_header_value_ids() {
        assert_eq!(encode_header_value("message-id", "abc@example.com"), "<abc@example.com>");
        assert_eq!(encode_header_value("Message-ID", "<abc@example.com>"), "<abc@example.com>");
        assert_eq!(encode_header_value("references", "a@x <b@x>"), "<a@x> <b@x>");
    }

    #[test]
    fn fold_line_ok() {
        let line = format!("Subject: {}", "word ".repeat(30).trim_end());
        let folded = fold_line(&line, LINE_WIDTH);

        assert!(folded.split("\r\n").all(|l| l.len() <= LINE_WIDTH));
        assert!(folded.split("\r\n").skip(1).all(|l| l.starts_with(' ')));
        assert_eq!(folded.replace("\r\n", ""), line);

        let unbreakable = format!("X-Long: {}", "x".repeat(100));
        assert_eq!(fold_line(&unbreakable, LINE_WIDTH), unbreakable);
    }
}
