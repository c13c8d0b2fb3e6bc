//! SMIMEA record data (RFC 8162).

use crate::util::CanonicalStr;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// The certificate usage field of an SMIMEA record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CertUsage {
    PkixTa,
    PkixEe,
    DaneTa,
    DaneEe,
}

impl CertUsage {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::PkixTa),
            1 => Some(Self::PkixEe),
            2 => Some(Self::DaneTa),
            3 => Some(Self::DaneEe),
            _ => None,
        }
    }
}

impl CanonicalStr for CertUsage {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::PkixTa => "PKIX-TA",
            Self::PkixEe => "PKIX-EE",
            Self::DaneTa => "DANE-TA",
            Self::DaneEe => "DANE-EE",
        }
    }
}

impl Display for CertUsage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RecordParseError {
    InvalidSyntax,
    InvalidHex,
    LengthMismatch,
    TooShort,
}

impl Display for RecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSyntax => write!(f, "invalid record data syntax"),
            Self::InvalidHex => write!(f, "invalid hexadecimal record data"),
            Self::LengthMismatch => write!(f, "record data length does not match"),
            Self::TooShort => write!(f, "record data too short"),
        }
    }
}

impl Error for RecordParseError {}

/// A decoded SMIMEA record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SmimeaRecord {
    pub cert_usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    /// Certificate association data; with selector 0 and matching type 0, the
    /// full DER-encoded certificate.
    pub data: Vec<u8>,
}

impl SmimeaRecord {
    /// Parses record data as found in the `data` field of a DoH JSON answer.
    ///
    /// Both the RFC 3597 generic form (`\# 730 0000…`) and the presentation
    /// form (`3 0 0 3082…`) are accepted. Hex digits may be interspersed with
    /// whitespace.
    pub fn from_rdata(s: &str) -> Result<Self, RecordParseError> {
        let s = s.trim();

        match s.strip_prefix(r"\#") {
            Some(rest) => parse_generic(rest),
            None => parse_presentation(s),
        }
    }

    pub fn usage(&self) -> Option<CertUsage> {
        CertUsage::from_u8(self.cert_usage)
    }

    /// Whether this record carries a full certificate, rather than a public
    /// key or a digest.
    pub fn is_full_certificate(&self) -> bool {
        self.selector == 0 && self.matching_type == 0
    }
}

fn parse_generic(s: &str) -> Result<SmimeaRecord, RecordParseError> {
    let s = s.trim_start();

    let (len, hex) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
    let len: usize = len.parse().map_err(|_| RecordParseError::InvalidSyntax)?;

    let bytes = decode_hex(hex)?;
    if bytes.len() != len {
        return Err(RecordParseError::LengthMismatch);
    }

    match bytes.as_slice() {
        [cert_usage, selector, matching_type, data @ ..] => Ok(SmimeaRecord {
            cert_usage: *cert_usage,
            selector: *selector,
            matching_type: *matching_type,
            data: data.to_vec(),
        }),
        _ => Err(RecordParseError::TooShort),
    }
}

fn parse_presentation(s: &str) -> Result<SmimeaRecord, RecordParseError> {
    let mut fields = s.split_whitespace();

    let mut next_u8 = || -> Result<u8, RecordParseError> {
        let field = fields.next().ok_or(RecordParseError::TooShort)?;
        field.parse().map_err(|_| RecordParseError::InvalidSyntax)
    };

    let cert_usage = next_u8()?;
    let selector = next_u8()?;
    let matching_type = next_u8()?;

    let hex: String = fields.collect();
    let data = decode_hex(&hex)?;

    Ok(SmimeaRecord {
        cert_usage,
        selector,
        matching_type,
        data,
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>, RecordParseError> {
    let s: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(s).map_err(|_| RecordParseError::InvalidHex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rdata_generic() {
        let record = SmimeaRecord::from_rdata(r"\# 6 030000 308182").unwrap();

        assert_eq!(record.usage(), Some(CertUsage::DaneEe));
        assert!(record.is_full_certificate());
        assert_eq!(record.data, [0x30, 0x81, 0x82]);

        assert_eq!(
            SmimeaRecord::from_rdata(r"\# 7 0300003081"),
            Err(RecordParseError::LengthMismatch)
        );
        assert_eq!(
            SmimeaRecord::from_rdata(r"\# 2 0300"),
            Err(RecordParseError::TooShort)
        );
        assert_eq!(
            SmimeaRecord::from_rdata(r"\# x 0300"),
            Err(RecordParseError::InvalidSyntax)
        );
        assert_eq!(
            SmimeaRecord::from_rdata(r"\# 3 03000g"),
            Err(RecordParseError::InvalidHex)
        );
    }

    #[test]
    fn from_rdata_generic_full_certificate() {
        let record = SmimeaRecord::from_rdata(r"\# 7 000000 30820102").unwrap();

        assert_eq!(
            (record.cert_usage, record.selector, record.matching_type),
            (0, 0, 0)
        );
        assert!(record.is_full_certificate());
        assert_eq!(record.data, [0x30, 0x82, 0x01, 0x02]);

        assert_eq!(
            SmimeaRecord::from_rdata(r"\# 7 000030820102"),
            Err(RecordParseError::LengthMismatch)
        );
    }

    #[test]
    fn from_rdata_presentation() {
        let record = SmimeaRecord::from_rdata("1 1 1 ABCD ef01").unwrap();

        assert_eq!(record.usage(), Some(CertUsage::PkixEe));
        assert!(!record.is_full_certificate());
        assert_eq!(record.data, [0xab, 0xcd, 0xef, 0x01]);

        assert_eq!(SmimeaRecord::from_rdata("3 0"), Err(RecordParseError::TooShort));
        assert_eq!(SmimeaRecord::from_rdata("3 0 256 00"), Err(RecordParseError::InvalidSyntax));
    }
}
