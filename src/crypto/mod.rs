//! Cryptographic utilities.
//!
//! This module wraps the primitives used by S/MIME: certificates and RSA keys,
//! the SHA-2 digests, RSA key transport and signatures, and AES-CBC content
//! encryption. The CMS structures built from these live in module `cms`.
//!
//! # Key transport parameters
//!
//! RSAES-OAEP key transport always uses MGF1 with the same hash as the OAEP
//! hash, and an empty label. The algorithm parameters are written out
//! explicitly. When decrypting, absent parameters are read with their RFC 4055
//! defaults (SHA-1 for both hash and MGF1), which are only supported with the
//! `sha1` feature.

mod aes;
mod cert;
mod hash;
mod rsa;

pub use self::{
    aes::{decrypt_content, encrypt_content, generate_content_key},
    cert::{Certificate, PrivateKey},
    hash::{digest, digest_slices},
    rsa::{decrypt_key, encrypt_key, sign_rsa, verify_rsa, KeyTransport},
};

use crate::{pem::PemError, util::CanonicalStr};
use der::oid::{AssociatedOid, ObjectIdentifier};
use digest::DynDigest;
use sha2::{Sha256, Sha384, Sha512};
#[cfg(feature = "sha1")]
use sha1::Sha1;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
pub const RSAES_OAEP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.7");
pub const MGF1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.8");
pub const P_SPECIFIED: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.9");
pub const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
pub const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
pub const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
pub const AES128_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.2");
pub const AES192_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.22");
pub const AES256_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.42");

/// Digest algorithm of an S/MIME signature.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

/// The canonical string is the `micalg` parameter value (RFC 8551).
impl CanonicalStr for DigestAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }
}

impl DigestAlgorithm {
    pub fn all() -> Vec<Self> {
        vec![Self::Sha256, Self::Sha384, Self::Sha512]
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha256 => Sha256::OID,
            Self::Sha384 => Sha384::OID,
            Self::Sha512 => Sha512::OID,
        }
    }

    /// The `shaNNNWithRSAEncryption` signature algorithm identifier.
    pub fn rsa_signature_oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha256 => SHA256_WITH_RSA,
            Self::Sha384 => SHA384_WITH_RSA,
            Self::Sha512 => SHA512_WITH_RSA,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::all().into_iter().find(|alg| alg.oid() == *oid)
    }

    pub fn from_rsa_signature_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::all().into_iter().find(|alg| alg.rsa_signature_oid() == *oid)
    }
}

/// Hash function for RSAES-OAEP key transport and its MGF1 mask generation.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum OaepHash {
    #[cfg(feature = "sha1")]
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl CanonicalStr for OaepHash {
    fn canonical_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "sha1")]
            Self::Sha1 => "sha-1",
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }
}

impl OaepHash {
    pub fn all() -> Vec<Self> {
        vec![
            #[cfg(feature = "sha1")]
            Self::Sha1,
            Self::Sha256,
            Self::Sha384,
            Self::Sha512,
        ]
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            #[cfg(feature = "sha1")]
            Self::Sha1 => Sha1::OID,
            Self::Sha256 => Sha256::OID,
            Self::Sha384 => Sha384::OID,
            Self::Sha512 => Sha512::OID,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::all().into_iter().find(|h| h.oid() == *oid)
    }

    fn dyn_digest(self) -> Box<dyn DynDigest + Send + Sync> {
        match self {
            #[cfg(feature = "sha1")]
            Self::Sha1 => Box::new(Sha1::default()),
            Self::Sha256 => Box::new(Sha256::default()),
            Self::Sha384 => Box::new(Sha384::default()),
            Self::Sha512 => Box::new(Sha512::default()),
        }
    }
}

/// Content encryption algorithm of an enveloped message.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ContentCipher {
    #[default]
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl CanonicalStr for ContentCipher {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Aes128Cbc => "aes128-cbc",
            Self::Aes192Cbc => "aes192-cbc",
            Self::Aes256Cbc => "aes256-cbc",
        }
    }
}

impl ContentCipher {
    pub fn all() -> Vec<Self> {
        vec![Self::Aes128Cbc, Self::Aes192Cbc, Self::Aes256Cbc]
    }

    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Aes128Cbc => AES128_CBC,
            Self::Aes192Cbc => AES192_CBC,
            Self::Aes256Cbc => AES256_CBC,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::all().into_iter().find(|c| c.oid() == *oid)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CertificateError {
    Pem(PemError),
    InvalidCertificate,
    UnsupportedKey,
}

impl Display for CertificateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pem(e) => write!(f, "failed to read certificate PEM: {e}"),
            Self::InvalidCertificate => write!(f, "invalid certificate data"),
            Self::UnsupportedKey => write!(f, "certificate does not contain an RSA public key"),
        }
    }
}

impl Error for CertificateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pem(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PemError> for CertificateError {
    fn from(error: PemError) -> Self {
        Self::Pem(error)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KeyError {
    Pem(PemError),
    InvalidKey,
}

impl Display for KeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pem(e) => write!(f, "failed to read private key PEM: {e}"),
            Self::InvalidKey => write!(f, "invalid or unsupported private key"),
        }
    }
}

impl Error for KeyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pem(e) => Some(e),
            Self::InvalidKey => None,
        }
    }
}

impl From<PemError> for KeyError {
    fn from(error: PemError) -> Self {
        Self::Pem(error)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EncryptionError {
    RandomUnavailable,
    KeyTransportFailure,
    ContentEncryptionFailure,
    EncodingFailure,
}

impl Display for EncryptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomUnavailable => write!(f, "no random data available"),
            Self::KeyTransportFailure => write!(f, "failed to encrypt content key"),
            Self::ContentEncryptionFailure => write!(f, "failed to encrypt content"),
            Self::EncodingFailure => write!(f, "failed to encode enveloped data"),
        }
    }
}

impl Error for EncryptionError {}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DecryptionError {
    InvalidEnvelopedData,
    UnsupportedAlgorithm,
    NoMatchingRecipient,
    ContentDecryptionFailure,
    InvalidUtf8,
}

impl Display for DecryptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvelopedData => write!(f, "invalid enveloped data"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported encryption algorithm"),
            Self::NoMatchingRecipient => write!(f, "no recipient could be decrypted with the key"),
            Self::ContentDecryptionFailure => write!(f, "failed to decrypt content"),
            Self::InvalidUtf8 => write!(f, "decrypted content is not UTF-8"),
        }
    }
}

impl Error for DecryptionError {}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SigningError {
    SigningFailure,
    EncodingFailure,
}

impl Display for SigningError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SigningFailure => write!(f, "failed to compute signature"),
            Self::EncodingFailure => write!(f, "failed to encode signed data"),
        }
    }
}

impl Error for SigningError {}

/// Error for a signature that cannot be evaluated at all. A signature that is
/// well-formed but does not match is reported through `VerificationResult`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VerificationError {
    InvalidSignedData,
    NoSignerInfo,
    MissingSignedAttributes,
    UnsupportedAlgorithm,
    InvalidKey,
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSignedData => write!(f, "invalid signed data"),
            Self::NoSignerInfo => write!(f, "no signer info in signed data"),
            Self::MissingSignedAttributes => write!(f, "missing signed attributes"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported signature algorithm"),
            Self::InvalidKey => write!(f, "invalid public key"),
        }
    }
}

impl Error for VerificationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_algorithm_oids() {
        assert_eq!(DigestAlgorithm::Sha256.oid().to_string(), "2.16.840.1.101.3.4.2.1");
        assert_eq!(
            DigestAlgorithm::from_rsa_signature_oid(&SHA512_WITH_RSA),
            Some(DigestAlgorithm::Sha512)
        );
        assert_eq!(DigestAlgorithm::from_oid(&RSA_ENCRYPTION), None);
        assert_eq!(DigestAlgorithm::Sha384.canonical_str(), "sha-384");
    }

    #[test]
    fn content_cipher_lookup() {
        assert_eq!(ContentCipher::from_oid(&AES256_CBC), Some(ContentCipher::Aes256Cbc));
        assert_eq!(ContentCipher::default().key_len(), 16);
    }
}
