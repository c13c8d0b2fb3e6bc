use crate::{
    cms::{decode_any, RsaOaepParams, ID_DATA, ID_ENVELOPED_DATA},
    crypto::{
        self, Certificate, CertificateError, ContentCipher, DecryptionError, EncryptionError,
        KeyTransport, OaepHash, PrivateKey, RSAES_OAEP, RSA_ENCRYPTION,
    },
};
use ::cms::{
    cert::IssuerAndSerialNumber,
    content_info::{CmsVersion, ContentInfo},
    enveloped_data::{
        EncryptedContentInfo, EnvelopedData, KeyTransRecipientInfo, RecipientIdentifier,
        RecipientInfo, RecipientInfos,
    },
};
use der::{
    asn1::{Any, OctetString, SetOfVec},
    Decode, Encode, Tag, Tagged,
};
use rsa::RsaPublicKey;
use spki::AlgorithmIdentifierOwned;
use tracing::trace;

/// The recipient of an enveloped message: certificate identity and public key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Recipient {
    pub id: IssuerAndSerialNumber,
    pub public_key: RsaPublicKey,
}

impl Recipient {
    pub fn from_certificate(cert: &Certificate) -> Result<Self, CertificateError> {
        Ok(Self {
            id: cert.issuer_and_serial_number(),
            public_key: cert.rsa_public_key()?,
        })
    }
}

/// Encrypts content for one recipient, returning a DER-encoded `ContentInfo`
/// with enveloped data.
pub fn encrypt_enveloped(
    plaintext: &[u8],
    recipient: &Recipient,
    oaep_hash: OaepHash,
    cipher: ContentCipher,
) -> Result<Vec<u8>, EncryptionError> {
    let (key, iv) = crypto::generate_content_key(cipher)?;

    let encrypted_content = crypto::encrypt_content(cipher, &key, &iv, plaintext)?;
    let encrypted_key =
        crypto::encrypt_key(&recipient.public_key, KeyTransport::oaep(oaep_hash), &key)?;

    trace!(?cipher, ?oaep_hash, len = plaintext.len(), "encrypted content");

    encode_enveloped_data(recipient, oaep_hash, cipher, &iv, encrypted_key, encrypted_content)
        .map_err(|_| EncryptionError::EncodingFailure)
}

fn encode_enveloped_data(
    recipient: &Recipient,
    oaep_hash: OaepHash,
    cipher: ContentCipher,
    iv: &[u8],
    encrypted_key: Vec<u8>,
    encrypted_content: Vec<u8>,
) -> Result<Vec<u8>, der::Error> {
    let oaep_params = RsaOaepParams::new(oaep_hash)?;

    let ktri = KeyTransRecipientInfo {
        version: CmsVersion::V0,
        rid: RecipientIdentifier::IssuerAndSerialNumber(recipient.id.clone()),
        key_enc_alg: AlgorithmIdentifierOwned {
            oid: RSAES_OAEP,
            parameters: Some(Any::encode_from(&oaep_params)?),
        },
        enc_key: OctetString::new(encrypted_key)?,
    };

    let encrypted_content_info = EncryptedContentInfo {
        content_type: ID_DATA,
        content_enc_alg: AlgorithmIdentifierOwned {
            oid: cipher.oid(),
            parameters: Some(Any::encode_from(&OctetString::new(iv)?)?),
        },
        encrypted_content: Some(OctetString::new(encrypted_content)?),
    };

    let enveloped_data = EnvelopedData {
        version: CmsVersion::V0,
        originator_info: None,
        recip_infos: RecipientInfos(SetOfVec::try_from(vec![RecipientInfo::Ktri(ktri)])?),
        encrypted_content: encrypted_content_info,
        unprotected_attrs: None,
    };

    ContentInfo {
        content_type: ID_ENVELOPED_DATA,
        content: Any::encode_from(&enveloped_data)?,
    }
    .to_der()
}

/// Decrypts a DER-encoded `ContentInfo` with enveloped data.
///
/// Every key transport recipient is tried with the given key, so the key
/// need not be accompanied by its certificate.
pub fn decrypt_enveloped(der: &[u8], private_key: &PrivateKey) -> Result<Vec<u8>, DecryptionError> {
    let content_info =
        ContentInfo::from_der(der).map_err(|_| DecryptionError::InvalidEnvelopedData)?;
    if content_info.content_type != ID_ENVELOPED_DATA {
        return Err(DecryptionError::InvalidEnvelopedData);
    }

    let enveloped_data: EnvelopedData = content_info
        .content
        .decode_as()
        .map_err(|_| DecryptionError::InvalidEnvelopedData)?;

    let eci = &enveloped_data.encrypted_content;

    let cipher = ContentCipher::from_oid(&eci.content_enc_alg.oid)
        .ok_or(DecryptionError::UnsupportedAlgorithm)?;
    let iv = eci
        .content_enc_alg
        .parameters
        .as_ref()
        .and_then(|params| decode_any::<OctetString>(params).ok())
        .ok_or(DecryptionError::InvalidEnvelopedData)?;
    let ciphertext = eci
        .encrypted_content
        .as_ref()
        .ok_or(DecryptionError::InvalidEnvelopedData)?;

    let mut unsupported = false;

    for recipient_info in enveloped_data.recip_infos.0.iter() {
        let RecipientInfo::Ktri(ktri) = recipient_info else {
            trace!("skipping non-key-transport recipient");
            continue;
        };

        let transport = match key_transport(&ktri.key_enc_alg) {
            Ok(transport) => transport,
            Err(e) => {
                trace!(oid = %ktri.key_enc_alg.oid, "skipping recipient: {e}");
                unsupported = true;
                continue;
            }
        };

        match crypto::decrypt_key(private_key.as_rsa(), transport, ktri.enc_key.as_bytes()) {
            Ok(key) if key.len() == cipher.key_len() => {
                trace!(?cipher, ?transport, "decrypted content key");
                return crypto::decrypt_content(cipher, &key, iv.as_bytes(), ciphertext.as_bytes());
            }
            _ => {
                trace!(?transport, "content key not decryptable with given key");
            }
        }
    }

    Err(if unsupported {
        DecryptionError::UnsupportedAlgorithm
    } else {
        DecryptionError::NoMatchingRecipient
    })
}

fn key_transport(alg: &AlgorithmIdentifierOwned) -> Result<KeyTransport, DecryptionError> {
    if alg.oid == RSA_ENCRYPTION {
        Ok(KeyTransport::Pkcs1v15)
    } else if alg.oid == RSAES_OAEP {
        let params = match &alg.parameters {
            Some(params) if params.tag() != Tag::Null => decode_any::<RsaOaepParams>(params)
                .map_err(|_| DecryptionError::InvalidEnvelopedData)?,
            _ => RsaOaepParams::default(),
        };
        params.key_transport()
    } else {
        Err(DecryptionError::UnsupportedAlgorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::content_type;

    const ALICE_CERT: &str = include_str!("../../tests/keys/alice.cert.pem");
    const ALICE_KEY: &str = include_str!("../../tests/keys/alice.key.pem");
    const BOB_KEY: &str = include_str!("../../tests/keys/bob.key.pem");

    fn alice() -> Recipient {
        Recipient::from_certificate(&Certificate::from_pem(ALICE_CERT).unwrap()).unwrap()
    }

    #[test]
    fn enveloped_round_trip() {
        let key = PrivateKey::from_pkcs8_pem(ALICE_KEY).unwrap();

        for cipher in ContentCipher::all() {
            let der = encrypt_enveloped(b"hello world", &alice(), OaepHash::Sha256, cipher).unwrap();

            assert_eq!(content_type(&der), Ok(ID_ENVELOPED_DATA));
            assert_eq!(decrypt_enveloped(&der, &key).unwrap(), b"hello world");
        }
    }

    #[test]
    fn enveloped_structure() {
        let der = encrypt_enveloped(b"x", &alice(), OaepHash::Sha384, ContentCipher::Aes256Cbc)
            .unwrap();

        let content_info = ContentInfo::from_der(&der).unwrap();
        let enveloped_data: EnvelopedData = content_info.content.decode_as().unwrap();

        assert_eq!(enveloped_data.version, CmsVersion::V0);
        assert_eq!(enveloped_data.recip_infos.0.len(), 1);

        let Some(RecipientInfo::Ktri(ktri)) = enveloped_data.recip_infos.0.iter().next() else {
            panic!("no key transport recipient");
        };
        assert_eq!(ktri.version, CmsVersion::V0);
        assert_eq!(ktri.rid, RecipientIdentifier::IssuerAndSerialNumber(alice().id));
        assert_eq!(ktri.key_enc_alg.oid, RSAES_OAEP);
        assert_eq!(key_transport(&ktri.key_enc_alg), Ok(KeyTransport::oaep(OaepHash::Sha384)));

        assert_eq!(
            enveloped_data.encrypted_content.content_enc_alg.oid,
            ContentCipher::Aes256Cbc.oid()
        );
    }

    #[test]
    fn wrong_key() {
        let der = encrypt_enveloped(b"secret", &alice(), OaepHash::Sha256, ContentCipher::Aes128Cbc)
            .unwrap();
        let bob = PrivateKey::from_pkcs8_pem(BOB_KEY).unwrap();

        assert_eq!(decrypt_enveloped(&der, &bob), Err(DecryptionError::NoMatchingRecipient));
    }

    #[test]
    fn not_enveloped_data() {
        let key = PrivateKey::from_pkcs8_pem(ALICE_KEY).unwrap();

        assert_eq!(decrypt_enveloped(b"", &key), Err(DecryptionError::InvalidEnvelopedData));

        let der = ContentInfo {
            content_type: ID_DATA,
            content: Any::encode_from(&OctetString::new(&b"x"[..]).unwrap()).unwrap(),
        }
        .to_der()
        .unwrap();
        assert_eq!(decrypt_enveloped(&der, &key), Err(DecryptionError::InvalidEnvelopedData));
    }
}
