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

//! Cryptographic Message Syntax structures used by S/MIME.
//!
//! This module produces and consumes DER-encoded `ContentInfo` structures of
//! type enveloped data (RFC 5652, section 6) and signed data (RFC 5652,
//! section 5), the latter either detached or carrying its content. It knows
//! nothing about MIME; the `smime` module wraps the output in MIME entities.

mod enveloped;
mod signed;

pub use self::{
    enveloped::{decrypt_enveloped, encrypt_enveloped, Recipient},
    signed::{
        extract_encapsulated, sign_detached, sign_encapsulated, verify_detached,
        verify_encapsulated, SignatureCheck,
    },
};

use crate::crypto::{DecryptionError, KeyTransport, OaepHash, MGF1, P_SPECIFIED};
use ::cms::content_info::ContentInfo;
use der::{
    asn1::{Any, ObjectIdentifier, OctetString},
    Decode, DecodeOwned, Encode, Sequence,
};
use spki::AlgorithmIdentifierOwned;

pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const ID_ENVELOPED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.3");
pub const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// Returns the content type of a DER-encoded `ContentInfo`.
pub fn content_type(der: &[u8]) -> Result<ObjectIdentifier, der::Error> {
    ContentInfo::from_der(der).map(|ci| ci.content_type)
}

/// ```text
/// RSAES-OAEP-params ::= SEQUENCE {
///     hashAlgorithm     [0] HashAlgorithm     DEFAULT sha1,
///     maskGenAlgorithm  [1] MaskGenAlgorithm  DEFAULT mgf1SHA1,
///     pSourceAlgorithm  [2] PSourceAlgorithm  DEFAULT pSpecifiedEmpty }
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
pub struct RsaOaepParams {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub hash: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub mask_gen: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub p_source: Option<AlgorithmIdentifierOwned>,
}

impl RsaOaepParams {
    /// Parameters with the given hash for both OAEP and MGF1, and an empty
    /// label.
    pub fn new(hash: OaepHash) -> Result<Self, der::Error> {
        let hash = AlgorithmIdentifierOwned {
            oid: hash.oid(),
            parameters: None,
        };
        let mask_gen = AlgorithmIdentifierOwned {
            oid: MGF1,
            parameters: Some(Any::encode_from(&hash)?),
        };

        Ok(Self {
            hash: Some(hash),
            mask_gen: Some(mask_gen),
            p_source: None,
        })
    }

    pub fn key_transport(&self) -> Result<KeyTransport, DecryptionError> {
        let hash = match &self.hash {
            Some(alg) => OaepHash::from_oid(&alg.oid).ok_or(DecryptionError::UnsupportedAlgorithm)?,
            None => default_oaep_hash()?,
        };

        let mgf_hash = match &self.mask_gen {
            Some(alg) if alg.oid == MGF1 => match &alg.parameters {
                Some(params) => {
                    let mgf_alg = decode_any::<AlgorithmIdentifierOwned>(params)
                        .map_err(|_| DecryptionError::InvalidEnvelopedData)?;
                    OaepHash::from_oid(&mgf_alg.oid).ok_or(DecryptionError::UnsupportedAlgorithm)?
                }
                None => default_oaep_hash()?,
            },
            Some(_) => return Err(DecryptionError::UnsupportedAlgorithm),
            None => default_oaep_hash()?,
        };

        if let Some(alg) = &self.p_source {
            let empty_label = alg.oid == P_SPECIFIED
                && alg.parameters.as_ref().map_or(true, |params| {
                    decode_any::<OctetString>(params).map_or(false, |label| label.as_bytes().is_empty())
                });
            if !empty_label {
                return Err(DecryptionError::UnsupportedAlgorithm);
            }
        }

        Ok(KeyTransport::Oaep { hash, mgf_hash })
    }
}

fn default_oaep_hash() -> Result<OaepHash, DecryptionError> {
    #[cfg(feature = "sha1")]
    {
        Ok(OaepHash::Sha1)
    }
    #[cfg(not(feature = "sha1"))]
    {
        Err(DecryptionError::UnsupportedAlgorithm)
    }
}

fn decode_any<T: DecodeOwned>(any: &Any) -> Result<T, der::Error> {
    T::from_der(&any.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oaep_params_round_trip() {
        let params = RsaOaepParams::new(OaepHash::Sha256).unwrap();
        let der = params.to_der().unwrap();

        let decoded = RsaOaepParams::from_der(&der).unwrap();
        assert_eq!(decoded, params);
        assert_eq!(
            decoded.key_transport(),
            Ok(KeyTransport::Oaep {
                hash: OaepHash::Sha256,
                mgf_hash: OaepHash::Sha256,
            })
        );
    }

    #[test]
    fn oaep_params_defaults() {
        let params = RsaOaepParams::from_der(&[0x30, 0x00]).unwrap();
        assert_eq!(params, RsaOaepParams::default());

        #[cfg(feature = "sha1")]
        assert_eq!(params.key_transport(), Ok(KeyTransport::oaep(OaepHash::Sha1)));
        #[cfg(not(feature = "sha1"))]
        assert_eq!(params.key_transport(), Err(DecryptionError::UnsupportedAlgorithm));
    }

    #[test]
    fn content_type_of_garbage() {
        assert!(content_type(b"not der").is_err());
    }
}
