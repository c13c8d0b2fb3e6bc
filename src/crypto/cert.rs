use crate::{
    crypto::{CertificateError, KeyError, RSA_ENCRYPTION},
    pem::{self, PemError, PemLabel},
};
use ::cms::cert::IssuerAndSerialNumber;
use der::{oid::AssociatedOid, Decode, Encode};
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    RsaPrivateKey, RsaPublicKey,
};
use x509_cert::ext::pkix::SubjectKeyIdentifier;

/// An X.509 certificate, kept together with its DER encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Certificate {
    inner: x509_cert::Certificate,
    der: Vec<u8>,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let inner = x509_cert::Certificate::from_der(der)
            .map_err(|_| CertificateError::InvalidCertificate)?;

        Ok(Self {
            inner,
            der: der.into(),
        })
    }

    /// Reads the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(s: &str) -> Result<Self, CertificateError> {
        let der = pem::decode_labeled(s, PemLabel::Certificate)?;
        Self::from_der(&der)
    }

    pub fn to_pem(&self) -> Result<String, PemError> {
        pem::encode(PemLabel::Certificate, &self.der)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn x509(&self) -> &x509_cert::Certificate {
        &self.inner
    }

    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    pub fn issuer(&self) -> String {
        self.inner.tbs_certificate.issuer.to_string()
    }

    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    /// The identifier of this certificate in CMS recipient and signer infos.
    pub fn issuer_and_serial_number(&self) -> IssuerAndSerialNumber {
        let tbs = &self.inner.tbs_certificate;
        IssuerAndSerialNumber {
            issuer: tbs.issuer.clone(),
            serial_number: tbs.serial_number.clone(),
        }
    }

    pub fn subject_key_identifier(&self) -> Option<Vec<u8>> {
        let extensions = self.inner.tbs_certificate.extensions.as_ref()?;
        let ext = extensions
            .iter()
            .find(|e| e.extn_id == SubjectKeyIdentifier::OID)?;
        let ski = SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()).ok()?;
        Some(ski.0.as_bytes().into())
    }

    pub fn rsa_public_key(&self) -> Result<RsaPublicKey, CertificateError> {
        let spki = &self.inner.tbs_certificate.subject_public_key_info;
        if spki.algorithm.oid != RSA_ENCRYPTION {
            return Err(CertificateError::UnsupportedKey);
        }

        let spki_der = spki
            .to_der()
            .map_err(|_| CertificateError::InvalidCertificate)?;

        RsaPublicKey::from_public_key_der(&spki_der).map_err(|_| CertificateError::UnsupportedKey)
    }
}

/// An RSA private key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyError> {
        RsaPrivateKey::from_pkcs8_der(der)
            .map(Self)
            .map_err(|_| KeyError::InvalidKey)
    }

    /// Reads the first `PRIVATE KEY` block of a PEM document.
    pub fn from_pkcs8_pem(s: &str) -> Result<Self, KeyError> {
        let der = pem::decode_labeled(s, PemLabel::PrivateKey)?;
        Self::from_pkcs8_der(&der)
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.0.to_public_key()
    }

    pub fn as_rsa(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE_CERT: &str = include_str!("../../tests/keys/alice.cert.pem");
    const ALICE_KEY: &str = include_str!("../../tests/keys/alice.key.pem");
    const BOB_KEY: &str = include_str!("../../tests/keys/bob.key.pem");

    #[test]
    fn read_certificate() {
        let cert = Certificate::from_pem(ALICE_CERT).unwrap();

        assert!(cert.subject().contains("CN=alice@example.com"));
        assert_eq!(
            hex::encode_upper(cert.serial_number()),
            "7AC17CD978A72070F6FBF3EA2378A449261C3E48"
        );
        assert_eq!(
            cert.subject_key_identifier().map(hex::encode_upper).as_deref(),
            Some("08B0A42FD8C24BC5FF2CF15A321ABBCD4A67E992")
        );

        let pem = cert.to_pem().unwrap();
        assert_eq!(Certificate::from_pem(&pem).unwrap(), cert);
    }

    #[test]
    fn key_matches_certificate() {
        let cert = Certificate::from_pem(ALICE_CERT).unwrap();
        let alice = PrivateKey::from_pkcs8_pem(ALICE_KEY).unwrap();
        let bob = PrivateKey::from_pkcs8_pem(BOB_KEY).unwrap();

        let public_key = cert.rsa_public_key().unwrap();
        assert_eq!(alice.public_key(), public_key);
        assert_ne!(bob.public_key(), public_key);
    }

    #[test]
    fn read_errors() {
        assert_eq!(
            Certificate::from_pem(ALICE_KEY),
            Err(CertificateError::Pem(PemError::UnexpectedLabel("PRIVATE KEY".into())))
        );
        assert_eq!(
            Certificate::from_der(b"\x30\x03\x02\x01\x01"),
            Err(CertificateError::InvalidCertificate)
        );
        assert_eq!(PrivateKey::from_pkcs8_pem("nothing"), Err(KeyError::Pem(PemError::NoPemBlock)));
    }
}
