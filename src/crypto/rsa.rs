use crate::crypto::{
    DecryptionError, DigestAlgorithm, EncryptionError, OaepHash, SigningError,
};
use rand::rngs::OsRng;
use rsa::{Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};

/// RSA key transport scheme for a content-encryption key.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyTransport {
    Oaep { hash: OaepHash, mgf_hash: OaepHash },
    Pkcs1v15,
}

impl KeyTransport {
    pub fn oaep(hash: OaepHash) -> Self {
        Self::Oaep { hash, mgf_hash: hash }
    }
}

fn oaep_padding(hash: OaepHash, mgf_hash: OaepHash) -> Oaep {
    Oaep {
        digest: hash.dyn_digest(),
        mgf_digest: mgf_hash.dyn_digest(),
        label: None,
    }
}

fn pkcs1v15_sign_padding(alg: DigestAlgorithm) -> Pkcs1v15Sign {
    match alg {
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

pub fn encrypt_key(
    public_key: &RsaPublicKey,
    transport: KeyTransport,
    key: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let result = match transport {
        KeyTransport::Oaep { hash, mgf_hash } => {
            public_key.encrypt(&mut OsRng, oaep_padding(hash, mgf_hash), key)
        }
        KeyTransport::Pkcs1v15 => public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, key),
    };

    result.map_err(|_| EncryptionError::KeyTransportFailure)
}

/// Decrypts a content-encryption key. Failure usually means that the key was
/// encrypted for someone else.
pub fn decrypt_key(
    private_key: &RsaPrivateKey,
    transport: KeyTransport,
    encrypted_key: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let result = match transport {
        KeyTransport::Oaep { hash, mgf_hash } => {
            private_key.decrypt(oaep_padding(hash, mgf_hash), encrypted_key)
        }
        KeyTransport::Pkcs1v15 => private_key.decrypt(Pkcs1v15Encrypt, encrypted_key),
    };

    result.map_err(|_| DecryptionError::NoMatchingRecipient)
}

/// Signs a precomputed digest with RSASSA-PKCS1-v1_5.
pub fn sign_rsa(
    alg: DigestAlgorithm,
    private_key: &RsaPrivateKey,
    hashed: &[u8],
) -> Result<Vec<u8>, SigningError> {
    private_key
        .sign(pkcs1v15_sign_padding(alg), hashed)
        .map_err(|_| SigningError::SigningFailure)
}

/// Verifies an RSASSA-PKCS1-v1_5 signature over a precomputed digest.
pub fn verify_rsa(
    alg: DigestAlgorithm,
    public_key: &RsaPublicKey,
    hashed: &[u8],
    signature: &[u8],
) -> bool {
    public_key
        .verify(pkcs1v15_sign_padding(alg), hashed, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{digest, PrivateKey};

    const ALICE_KEY: &str = include_str!("../../tests/keys/alice.key.pem");
    const BOB_KEY: &str = include_str!("../../tests/keys/bob.key.pem");

    #[test]
    fn key_transport_round_trip() {
        let alice = PrivateKey::from_pkcs8_pem(ALICE_KEY).unwrap();
        let bob = PrivateKey::from_pkcs8_pem(BOB_KEY).unwrap();

        let transports = [
            KeyTransport::oaep(OaepHash::Sha256),
            KeyTransport::Oaep {
                hash: OaepHash::Sha512,
                mgf_hash: OaepHash::Sha256,
            },
            KeyTransport::Pkcs1v15,
        ];

        for transport in transports {
            let encrypted = encrypt_key(&alice.public_key(), transport, &[7; 16]).unwrap();

            assert_eq!(decrypt_key(alice.as_rsa(), transport, &encrypted).unwrap(), [7; 16]);
            assert_eq!(
                decrypt_key(bob.as_rsa(), transport, &encrypted),
                Err(DecryptionError::NoMatchingRecipient)
            );
        }
    }

    #[test]
    fn sign_and_verify() {
        let alice = PrivateKey::from_pkcs8_pem(ALICE_KEY).unwrap();
        let bob = PrivateKey::from_pkcs8_pem(BOB_KEY).unwrap();

        for alg in DigestAlgorithm::all() {
            let hashed = digest(alg, b"message");
            let signature = sign_rsa(alg, alice.as_rsa(), &hashed).unwrap();

            assert!(verify_rsa(alg, &alice.public_key(), &hashed, &signature));
            assert!(!verify_rsa(alg, &bob.public_key(), &hashed, &signature));
            assert!(!verify_rsa(alg, &alice.public_key(), &digest(alg, b"other"), &signature));
        }
    }
}
