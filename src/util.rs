use base64ct::{Base64, Encoding};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// A trait for entities that can be represented as a canonical string.
pub trait CanonicalStr {
    /// Returns the canonical representation as a static string slice.
    fn canonical_str(&self) -> &'static str;
}

/// Line length of Base64 bodies in MIME entities.
pub const BASE64_LINE_WIDTH: usize = 76;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Base64Error;

impl Display for Base64Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode Base64 data")
    }
}

impl Error for Base64Error {}

/// Encodes binary data as a Base64 string.
pub fn encode_base64<T: AsRef<[u8]>>(input: T) -> String {
    Base64::encode_string(input.as_ref())
}

/// Encodes binary data as Base64, broken into CRLF-separated lines of at most
/// 76 characters.
pub fn encode_base64_lines<T: AsRef<[u8]>>(input: T) -> String {
    let encoded = encode_base64(input);

    // Base64 output is ASCII, chunking by bytes is safe.
    let lines: Vec<_> = encoded
        .as_bytes()
        .chunks(BASE64_LINE_WIDTH)
        .map(|chunk| String::from_utf8_lossy(chunk))
        .collect();

    lines.join("\r\n")
}

/// Decodes a Base64 string. ASCII whitespace, including line breaks, is
/// ignored.
pub fn decode_base64(s: &str) -> Result<Vec<u8>, Base64Error> {
    let s: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Base64::decode_vec(&s).map_err(|_| Base64Error)
}
