use crate::{
    canonicalize::canonicalize_line_endings,
    cms,
    crypto::{Certificate, PrivateKey},
    mime::{MimeBuilder, MimeParseError, MimePart, NodeOptions},
    smime::{
        build_cms_entity, create_root, is_signature_type, sniff_part, Config, SmimeError,
        SmimeKind, VerificationResult,
    },
    util::CanonicalStr,
};
use std::time::SystemTime;
use tracing::debug;

pub(crate) const OPAQUE_SIGNED_CONTENT_TYPE: &str =
    "application/pkcs7-mime; name=smime.p7m; smime-type=signed-data";

const SIGNATURE_CONTENT_TYPE: &str = "application/pkcs7-signature; name=smime.p7s";

/// Signs text, returning a `multipart/signed` message with the text as the
/// first part and a detached signature as the second.
///
/// Text that is not 7-bit or that has lines longer than 76 characters is
/// quoted-printable encoded, so that the signed part survives transport
/// unchanged.
///
/// # Examples
///
/// ```no_run
/// # fn f(key_pem: &str, cert_pem: &str) -> Result<(), viasmime::smime::SmimeError> {
/// use viasmime::smime::{self, Config};
///
/// let config = Config::default();
///
/// let message = smime::sign("testString", key_pem, cert_pem, &config)?;
/// let result = smime::verify(&message, cert_pem)?;
///
/// assert!(result.signature_verified);
/// # Ok(())
/// # }
/// ```
pub fn sign(
    plaintext: &str,
    private_key_pem: &str,
    certificate_pem: &str,
    config: &Config,
) -> Result<String, SmimeError> {
    let private_key = PrivateKey::from_pkcs8_pem(private_key_pem)?;
    let certificate = Certificate::from_pem(certificate_pem)?;

    let digest_alg = config.signing.digest_algorithm;

    let mut builder = MimeBuilder::new();

    let content_type = format!(
        "multipart/signed; protocol=\"application/pkcs7-signature\"; micalg={}",
        digest_alg.canonical_str()
    );
    let root = create_root(&mut builder, &content_type, &config.build);

    let text = builder.create_child(root, Some("text/plain"), NodeOptions::default());
    builder.set_content(text, plaintext);
    if needs_quoted_printable(plaintext) {
        builder.set_header(text, "Content-Transfer-Encoding", "quoted-printable");
    }

    let signed_entity = canonicalize_line_endings(builder.build(text).as_bytes());

    let signature = cms::sign_detached(
        &signed_entity,
        &certificate,
        &private_key,
        digest_alg,
        signing_time(config),
    )?;

    let sig = builder.create_child(root, Some(SIGNATURE_CONTENT_TYPE), NodeOptions::default());
    builder
        .set_header(sig, "Content-Disposition", "attachment; filename=smime.p7s")
        .set_header(sig, "Content-Description", "S/MIME Cryptographic Signature")
        .set_header(sig, "Content-Transfer-Encoding", "base64")
        .set_content(sig, signature);

    debug!(subject = %certificate.subject(), ?digest_alg, "signed message");

    Ok(builder.build(root))
}

/// Signs text, returning an `application/pkcs7-mime` message whose signed
/// data carries the text.
pub fn sign_opaque(
    plaintext: &str,
    private_key_pem: &str,
    certificate_pem: &str,
    config: &Config,
) -> Result<String, SmimeError> {
    let private_key = PrivateKey::from_pkcs8_pem(private_key_pem)?;
    let certificate = Certificate::from_pem(certificate_pem)?;

    let der = cms::sign_encapsulated(
        plaintext.as_bytes(),
        &certificate,
        &private_key,
        config.signing.digest_algorithm,
        signing_time(config),
    )?;

    debug!(subject = %certificate.subject(), "signed opaque message");

    Ok(build_cms_entity(
        OPAQUE_SIGNED_CONTENT_TYPE,
        "Signed Data",
        "smime.p7m",
        der,
        &config.build,
    ))
}

/// Verifies a signed message against a certificate.
///
/// A signature that does not match yields a result with
/// `signature_verified == false`; a message that cannot be evaluated at all
/// yields an error.
pub fn verify(smime_text: &str, certificate_pem: &str) -> Result<VerificationResult, SmimeError> {
    let certificate = Certificate::from_pem(certificate_pem)?;

    let part = MimePart::parse(smime_text)?;

    let check = match sniff_part(&part) {
        SmimeKind::Signed => {
            let (content, signature) = signed_parts(&part)?;

            let signed_entity = canonicalize_line_endings(content.raw());
            let der = signature.decoded_body()?;

            cms::verify_detached(&signed_entity, &der, &certificate)?
        }
        SmimeKind::OpaqueSigned => {
            let der = part.decoded_body()?;
            let (check, _) = cms::verify_encapsulated(&der, &certificate)?;
            check
        }
        SmimeKind::Enveloped | SmimeKind::NotSmime => {
            return Err(MimeParseError::NotSmime.into());
        }
    };

    let result = VerificationResult::from(check);

    debug!(verified = result.signature_verified, failure = ?result.failure, "verified message");

    Ok(result)
}

/// Returns the signed text of a signed message, without verifying the
/// signature.
pub fn get_signature_body(smime_text: &str) -> Result<String, SmimeError> {
    let part = MimePart::parse(smime_text)?;

    let body = match sniff_part(&part) {
        SmimeKind::Signed => {
            let (content, _) = signed_parts(&part)?;
            content.decoded_body()?
        }
        SmimeKind::OpaqueSigned => {
            let der = part.decoded_body()?;
            cms::extract_encapsulated(&der)?
        }
        SmimeKind::Enveloped | SmimeKind::NotSmime => {
            return Err(MimeParseError::NotSmime.into());
        }
    };

    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn signed_parts(part: &MimePart) -> Result<(&MimePart, &MimePart), MimeParseError> {
    match part.children() {
        [content, signature] => {
            if is_signature_type(&signature.content_type().mime_type()) {
                Ok((content, signature))
            } else {
                Err(MimeParseError::MissingSignaturePart)
            }
        }
        children => Err(MimeParseError::UnexpectedPartCount(children.len())),
    }
}

fn needs_quoted_printable(text: &str) -> bool {
    text.chars()
        .any(|c| !c.is_ascii() || (c.is_ascii_control() && !matches!(c, '\t' | '\r' | '\n')))
        || text.split(|c| c == '\r' || c == '\n').any(|line| line.len() > 76)
}

fn signing_time(config: &Config) -> SystemTime {
    config
        .signing
        .fixed_signing_time
        .unwrap_or_else(SystemTime::now)
}
