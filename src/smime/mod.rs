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

//! S/MIME message operations.
//!
//! The functions in this module take and return wire text: [`encrypt`] and
//! [`decrypt`] for enveloped messages, [`sign`] and [`verify`] for detached
//! `multipart/signed` messages, and [`sign_opaque`] for messages that carry
//! their content inside the signature. All of them run synchronously; the
//! [`SmimeEngine`] offers the same operations as `async` functions that run
//! on the blocking thread pool.
//!
//! Each operation handles a single S/MIME layer. Nested messages (for example
//! signed, then encrypted) are unwrapped by calling [`sniff`] on the result
//! of one operation and feeding it into the next, until it reports
//! [`SmimeKind::NotSmime`].
//!
//! # Line endings in signed content
//!
//! The signature of a `multipart/signed` message covers the first body part,
//! headers and body, with all line endings converted to CRLF before
//! digesting. A message that was converted from CRLF to LF line endings in
//! transit therefore still verifies. Any other change to the signed part
//! makes verification fail.

mod engine;
mod envelope;
mod sign;

pub use self::{
    engine::SmimeEngine,
    envelope::{decrypt, encrypt},
    sign::{get_signature_body, sign, sign_opaque, verify},
};

use crate::{
    cms::{self, SignatureCheck},
    crypto::{
        CertificateError, ContentCipher, DecryptionError, DigestAlgorithm, EncryptionError,
        KeyError, OaepHash, SigningError, VerificationError,
    },
    mime::{MimeBuilder, MimeParseError, MimePart, NodeId, NodeOptions},
    pem::PemError,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::SystemTime,
};

/// Configuration of S/MIME operations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    pub encryption: EncryptionConfig,
    pub signing: SigningConfig,
    pub build: BuildOptions,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct EncryptionConfig {
    /// Hash for RSAES-OAEP key transport and its mask generation function.
    pub oaep_hash: OaepHash,
    /// Content encryption algorithm, AES-128-CBC by default.
    pub content_cipher: ContentCipher,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SigningConfig {
    /// Digest algorithm of signatures. The `micalg` parameter of signed
    /// messages follows this setting.
    pub digest_algorithm: DigestAlgorithm,

    /// If given, the signing time to use instead of the current time. This is
    /// mainly useful for testing.
    pub fixed_signing_time: Option<SystemTime>,
}

/// Options for the MIME messages produced by [`encrypt`], [`sign`] and
/// [`sign_opaque`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BuildOptions {
    /// Whether a `Bcc` header among the extra headers is emitted.
    pub include_bcc: bool,

    /// Headers set on the top-level entity, for example `From`, `To`, and
    /// `Subject`.
    pub extra_headers: Vec<(String, String)>,
}

/// The kind of S/MIME layer at the top of a message.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SmimeKind {
    NotSmime,
    /// `application/pkcs7-mime` with enveloped data.
    Enveloped,
    /// `multipart/signed` with a detached signature.
    Signed,
    /// `application/pkcs7-mime` with signed data carrying the content.
    OpaqueSigned,
}

/// Why a signature did not verify.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VerificationFailure {
    /// The signature was made by someone other than the certificate holder.
    SignerMismatch,
    /// The signed content was modified.
    DigestMismatch,
    /// The signature value does not match the certificate's public key.
    SignatureMismatch,
}

impl Display for VerificationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignerMismatch => write!(f, "signer does not match certificate"),
            Self::DigestMismatch => write!(f, "content digest does not match"),
            Self::SignatureMismatch => write!(f, "signature does not match"),
        }
    }
}

/// The result of verifying a well-formed signed message.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct VerificationResult {
    pub signature_verified: bool,
    pub failure: Option<VerificationFailure>,
}

impl From<SignatureCheck> for VerificationResult {
    fn from(check: SignatureCheck) -> Self {
        let failure = match check {
            SignatureCheck::Valid => None,
            SignatureCheck::SignerMismatch => Some(VerificationFailure::SignerMismatch),
            SignatureCheck::DigestMismatch => Some(VerificationFailure::DigestMismatch),
            SignatureCheck::SignatureMismatch => Some(VerificationFailure::SignatureMismatch),
        };

        Self {
            signature_verified: failure.is_none(),
            failure,
        }
    }
}

/// An error that occurs in an S/MIME operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SmimeError {
    Pem(PemError),
    Certificate(CertificateError),
    Key(KeyError),
    MimeParse(MimeParseError),
    Encryption(EncryptionError),
    Decryption(DecryptionError),
    Signing(SigningError),
    Verification(VerificationError),
    /// The blocking task running the operation failed.
    Task(String),
}

impl Display for SmimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pem(e) => write!(f, "failed to decode PEM: {e}"),
            Self::Certificate(e) => write!(f, "failed to read certificate: {e}"),
            Self::Key(e) => write!(f, "failed to read private key: {e}"),
            Self::MimeParse(e) => write!(f, "failed to parse message: {e}"),
            Self::Encryption(e) => write!(f, "encryption failed: {e}"),
            Self::Decryption(e) => write!(f, "decryption failed: {e}"),
            Self::Signing(e) => write!(f, "signing failed: {e}"),
            Self::Verification(e) => write!(f, "verification failed: {e}"),
            Self::Task(msg) => write!(f, "operation task failed: {msg}"),
        }
    }
}

impl Error for SmimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pem(e) => Some(e),
            Self::Certificate(e) => Some(e),
            Self::Key(e) => Some(e),
            Self::MimeParse(e) => Some(e),
            Self::Encryption(e) => Some(e),
            Self::Decryption(e) => Some(e),
            Self::Signing(e) => Some(e),
            Self::Verification(e) => Some(e),
            Self::Task(_) => None,
        }
    }
}

impl From<PemError> for SmimeError {
    fn from(error: PemError) -> Self {
        Self::Pem(error)
    }
}

impl From<CertificateError> for SmimeError {
    fn from(error: CertificateError) -> Self {
        match error {
            CertificateError::Pem(e) => Self::Pem(e),
            e => Self::Certificate(e),
        }
    }
}

impl From<KeyError> for SmimeError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::Pem(e) => Self::Pem(e),
            e => Self::Key(e),
        }
    }
}

impl From<MimeParseError> for SmimeError {
    fn from(error: MimeParseError) -> Self {
        Self::MimeParse(error)
    }
}

impl From<EncryptionError> for SmimeError {
    fn from(error: EncryptionError) -> Self {
        Self::Encryption(error)
    }
}

impl From<DecryptionError> for SmimeError {
    fn from(error: DecryptionError) -> Self {
        Self::Decryption(error)
    }
}

impl From<SigningError> for SmimeError {
    fn from(error: SigningError) -> Self {
        Self::Signing(error)
    }
}

impl From<VerificationError> for SmimeError {
    fn from(error: VerificationError) -> Self {
        Self::Verification(error)
    }
}

/// Classifies a message by its top-level content type. Unparsable input is
/// not S/MIME.
pub fn sniff(text: &str) -> SmimeKind {
    match MimePart::parse(text) {
        Ok(part) => sniff_part(&part),
        Err(_) => SmimeKind::NotSmime,
    }
}

fn sniff_part(part: &MimePart) -> SmimeKind {
    let content_type = part.content_type();

    match content_type.mime_type().as_str() {
        "application/pkcs7-mime" | "application/x-pkcs7-mime" => {
            let smime_type = content_type
                .param("smime-type")
                .map(|t| t.trim().to_ascii_lowercase());

            match smime_type.as_deref() {
                Some("enveloped-data") => SmimeKind::Enveloped,
                Some("signed-data") => SmimeKind::OpaqueSigned,
                Some(_) => SmimeKind::NotSmime,
                // without the parameter, look at the CMS content type
                None => match part.decoded_body().ok().and_then(|der| cms::content_type(&der).ok()) {
                    Some(oid) if oid == cms::ID_ENVELOPED_DATA => SmimeKind::Enveloped,
                    Some(oid) if oid == cms::ID_SIGNED_DATA => SmimeKind::OpaqueSigned,
                    _ => SmimeKind::NotSmime,
                },
            }
        }
        "multipart/signed" => {
            let protocol = content_type
                .param("protocol")
                .map(|p| p.trim().to_ascii_lowercase());

            match protocol.as_deref() {
                Some(p) if is_signature_type(p) => SmimeKind::Signed,
                _ => SmimeKind::NotSmime,
            }
        }
        _ => SmimeKind::NotSmime,
    }
}

fn is_signature_type(mime_type: &str) -> bool {
    matches!(mime_type, "application/pkcs7-signature" | "application/x-pkcs7-signature")
}

// a base64 leaf carrying DER, with the extra headers on top
fn build_cms_entity(
    content_type: &str,
    description: &str,
    filename: &str,
    der: Vec<u8>,
    options: &BuildOptions,
) -> String {
    let mut builder = MimeBuilder::new();
    let node = create_root(&mut builder, content_type, options);

    builder
        .set_header(node, "Content-Description", description)
        .set_header(node, "Content-Disposition", format!("attachment; filename={filename}"))
        .set_header(node, "Content-Transfer-Encoding", "base64")
        .set_content(node, der);

    builder.build(node)
}

fn create_root(builder: &mut MimeBuilder, content_type: &str, options: &BuildOptions) -> NodeId {
    let node = builder.create_node(
        Some(content_type),
        NodeOptions {
            include_bcc: options.include_bcc,
            ..Default::default()
        },
    );

    builder.set_headers(
        node,
        options.extra_headers.iter().map(|(k, v)| (k, v.as_str())),
    );

    node
}
