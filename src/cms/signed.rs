use crate::{
    cms::{decode_any, ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST, ID_SIGNED_DATA, ID_SIGNING_TIME},
    crypto::{
        self, Certificate, DigestAlgorithm, PrivateKey, SigningError, VerificationError,
        RSA_ENCRYPTION,
    },
};
use ::cms::{
    cert::CertificateChoices,
    content_info::{CmsVersion, ContentInfo},
    signed_data::{
        CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
        SignerInfos,
    },
};
use der::{
    asn1::{Any, GeneralizedTime, ObjectIdentifier, OctetString, SetOfVec, UtcTime},
    Decode, Encode,
};
use spki::AlgorithmIdentifierOwned;
use std::time::SystemTime;
use tracing::trace;
use x509_cert::{
    attr::{Attribute, Attributes},
    time::Time,
};

/// Outcome of checking a detached signature against content.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureCheck {
    Valid,
    /// The signer info does not identify the given certificate.
    SignerMismatch,
    /// The content does not match the signed message digest.
    DigestMismatch,
    /// The signature value is not valid for the certificate's key.
    SignatureMismatch,
}

/// Signs content, returning a DER-encoded `ContentInfo` with detached signed
/// data. The content is digested as given; callers canonicalise it first.
pub fn sign_detached(
    content: &[u8],
    certificate: &Certificate,
    private_key: &PrivateKey,
    digest_alg: DigestAlgorithm,
    signing_time: SystemTime,
) -> Result<Vec<u8>, SigningError> {
    sign_content(content, certificate, private_key, digest_alg, signing_time, false)
}

/// Signs content, returning a DER-encoded `ContentInfo` with signed data that
/// carries the content itself.
pub fn sign_encapsulated(
    content: &[u8],
    certificate: &Certificate,
    private_key: &PrivateKey,
    digest_alg: DigestAlgorithm,
    signing_time: SystemTime,
) -> Result<Vec<u8>, SigningError> {
    sign_content(content, certificate, private_key, digest_alg, signing_time, true)
}

fn sign_content(
    content: &[u8],
    certificate: &Certificate,
    private_key: &PrivateKey,
    digest_alg: DigestAlgorithm,
    signing_time: SystemTime,
    encapsulate: bool,
) -> Result<Vec<u8>, SigningError> {
    let message_digest = crypto::digest(digest_alg, content);

    let signed_attrs = signed_attributes(&message_digest, signing_time)
        .map_err(|_| SigningError::EncodingFailure)?;
    let signed_attrs_der = signed_attrs
        .to_der()
        .map_err(|_| SigningError::EncodingFailure)?;

    let signature = crypto::sign_rsa(
        digest_alg,
        private_key.as_rsa(),
        &crypto::digest(digest_alg, &signed_attrs_der),
    )?;

    trace!(?digest_alg, encapsulate, len = content.len(), "signed content");

    let econtent = encapsulate.then_some(content);

    encode_signed_data(certificate, digest_alg, signed_attrs, signature, econtent)
        .map_err(|_| SigningError::EncodingFailure)
}

fn signed_attributes(
    message_digest: &[u8],
    signing_time: SystemTime,
) -> Result<Attributes, der::Error> {
    let signing_time = match UtcTime::from_system_time(signing_time) {
        Ok(t) => Time::UtcTime(t),
        Err(_) => Time::GeneralTime(GeneralizedTime::from_system_time(signing_time)?),
    };

    let attrs = vec![
        attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA)?)?,
        attribute(ID_SIGNING_TIME, Any::encode_from(&signing_time)?)?,
        attribute(ID_MESSAGE_DIGEST, Any::encode_from(&OctetString::new(message_digest)?)?)?,
    ];

    SetOfVec::try_from(attrs)
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute, der::Error> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

fn encode_signed_data(
    certificate: &Certificate,
    digest_alg: DigestAlgorithm,
    signed_attrs: Attributes,
    signature: Vec<u8>,
    econtent: Option<&[u8]>,
) -> Result<Vec<u8>, der::Error> {
    let digest_alg_id = AlgorithmIdentifierOwned {
        oid: digest_alg.oid(),
        parameters: None,
    };

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(certificate.issuer_and_serial_number()),
        digest_alg: digest_alg_id.clone(),
        signed_attrs: Some(signed_attrs),
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: digest_alg.rsa_signature_oid(),
            parameters: Some(Any::null()),
        },
        signature: OctetString::new(signature)?,
        unsigned_attrs: None,
    };

    let certificates = CertificateSet(SetOfVec::try_from(vec![CertificateChoices::Certificate(
        certificate.x509().clone(),
    )])?);

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![digest_alg_id])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent: econtent
                .map(|c| Any::encode_from(&OctetString::new(c)?))
                .transpose()?,
        },
        certificates: Some(certificates),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
    };

    ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data)?,
    }
    .to_der()
}

/// Checks a DER-encoded detached signature over content, using the public key
/// of the given certificate. Certificates embedded in the signature are
/// ignored.
///
/// Only the first signer info is evaluated.
pub fn verify_detached(
    content: &[u8],
    signature_der: &[u8],
    certificate: &Certificate,
) -> Result<SignatureCheck, VerificationError> {
    let signed_data = decode_signed_data(signature_der)?;
    check_signer(&signed_data, content, certificate)
}

/// Checks DER-encoded signed data that carries its content, returning the
/// check outcome together with the content.
pub fn verify_encapsulated(
    signed_der: &[u8],
    certificate: &Certificate,
) -> Result<(SignatureCheck, Vec<u8>), VerificationError> {
    let signed_data = decode_signed_data(signed_der)?;

    let content = encapsulated_content(&signed_data)?;
    let check = check_signer(&signed_data, &content, certificate)?;

    Ok((check, content))
}

/// Extracts the content of DER-encoded signed data without checking the
/// signature.
pub fn extract_encapsulated(signed_der: &[u8]) -> Result<Vec<u8>, VerificationError> {
    let signed_data = decode_signed_data(signed_der)?;
    encapsulated_content(&signed_data)
}

fn decode_signed_data(der: &[u8]) -> Result<SignedData, VerificationError> {
    let content_info =
        ContentInfo::from_der(der).map_err(|_| VerificationError::InvalidSignedData)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(VerificationError::InvalidSignedData);
    }

    content_info
        .content
        .decode_as()
        .map_err(|_| VerificationError::InvalidSignedData)
}

fn encapsulated_content(signed_data: &SignedData) -> Result<Vec<u8>, VerificationError> {
    let econtent = signed_data
        .encap_content_info
        .econtent
        .as_ref()
        .ok_or(VerificationError::InvalidSignedData)?;

    decode_any::<OctetString>(econtent)
        .map(|content| content.into_bytes())
        .map_err(|_| VerificationError::InvalidSignedData)
}

fn check_signer(
    signed_data: &SignedData,
    content: &[u8],
    certificate: &Certificate,
) -> Result<SignatureCheck, VerificationError> {
    let signer_info = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or(VerificationError::NoSignerInfo)?;

    let signer_matches = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => *id == certificate.issuer_and_serial_number(),
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            certificate.subject_key_identifier().as_deref() == Some(ski.0.as_bytes())
        }
    };
    if !signer_matches {
        trace!("signer info does not identify certificate");
        return Ok(SignatureCheck::SignerMismatch);
    }

    let digest_alg = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid)
        .ok_or(VerificationError::UnsupportedAlgorithm)?;

    let signature_oid = signer_info.signature_algorithm.oid;
    if signature_oid != RSA_ENCRYPTION && signature_oid != digest_alg.rsa_signature_oid() {
        return Err(VerificationError::UnsupportedAlgorithm);
    }

    let public_key = certificate
        .rsa_public_key()
        .map_err(|_| VerificationError::InvalidKey)?;

    let content_digest = crypto::digest(digest_alg, content);

    let signed_digest = match &signer_info.signed_attrs {
        Some(attrs) => {
            let message_digest = find_message_digest(attrs)?;
            if message_digest.as_bytes() != &content_digest[..] {
                trace!(?digest_alg, "message digest mismatch");
                return Ok(SignatureCheck::DigestMismatch);
            }

            let attrs_der = attrs
                .to_der()
                .map_err(|_| VerificationError::InvalidSignedData)?;
            crypto::digest(digest_alg, &attrs_der)
        }
        None => content_digest,
    };

    if crypto::verify_rsa(digest_alg, &public_key, &signed_digest, signer_info.signature.as_bytes()) {
        Ok(SignatureCheck::Valid)
    } else {
        trace!(?digest_alg, "signature value mismatch");
        Ok(SignatureCheck::SignatureMismatch)
    }
}

fn find_message_digest(attrs: &Attributes) -> Result<OctetString, VerificationError> {
    let attr = attrs
        .iter()
        .find(|a| a.oid == ID_MESSAGE_DIGEST)
        .ok_or(VerificationError::MissingSignedAttributes)?;

    let value = attr
        .values
        .iter()
        .next()
        .ok_or(VerificationError::MissingSignedAttributes)?;

    decode_any::<OctetString>(value).map_err(|_| VerificationError::InvalidSignedData)
}
