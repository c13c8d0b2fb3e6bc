use crate::crypto::{ContentCipher, DecryptionError, EncryptionError};
use aes::{
    cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
    Aes128, Aes192, Aes256,
};

pub const IV_LEN: usize = 16;

/// Generates a random content-encryption key and IV for the cipher.
pub fn generate_content_key(
    cipher: ContentCipher,
) -> Result<(Vec<u8>, [u8; IV_LEN]), EncryptionError> {
    let mut key = vec![0; cipher.key_len()];
    let mut iv = [0; IV_LEN];

    getrandom::getrandom(&mut key).map_err(|_| EncryptionError::RandomUnavailable)?;
    getrandom::getrandom(&mut iv).map_err(|_| EncryptionError::RandomUnavailable)?;

    Ok((key, iv))
}

pub fn encrypt_content(
    cipher: ContentCipher,
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let result = match cipher {
        ContentCipher::Aes128Cbc => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        ContentCipher::Aes192Cbc => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        ContentCipher::Aes256Cbc => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
    };

    result.map_err(|_| EncryptionError::ContentEncryptionFailure)
}

pub fn decrypt_content(
    cipher: ContentCipher,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let result = match cipher {
        ContentCipher::Aes128Cbc => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        ContentCipher::Aes192Cbc => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
        ContentCipher::Aes256Cbc => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map(|c| c.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)),
    };

    match result {
        Ok(Ok(plaintext)) => Ok(plaintext),
        _ => Err(DecryptionError::ContentDecryptionFailure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes128_cbc_known_answer() {
        // NIST SP 800-38A, F.2.1
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let ciphertext = encrypt_content(ContentCipher::Aes128Cbc, &key, &iv, &plaintext).unwrap();

        assert_eq!(ciphertext.len(), 32);
        assert_eq!(hex::encode(&ciphertext[..16]), "7649abac8119b246cee98e9b12e9197d");
        assert_eq!(
            decrypt_content(ContentCipher::Aes128Cbc, &key, &iv, &ciphertext).unwrap(),
            plaintext
        );
    }

    #[test]
    fn generated_keys_fit_cipher() {
        for cipher in ContentCipher::all() {
            let (key, iv) = generate_content_key(cipher).unwrap();
            assert_eq!(key.len(), cipher.key_len());

            let ciphertext = encrypt_content(cipher, &key, &iv, b"hello").unwrap();
            assert_eq!(decrypt_content(cipher, &key, &iv, &ciphertext).unwrap(), b"hello");
        }
    }

    #[test]
    fn wrong_key_length() {
        assert_eq!(
            encrypt_content(ContentCipher::Aes256Cbc, &[0; 16], &[0; 16], b"x"),
            Err(EncryptionError::ContentEncryptionFailure)
        );
        assert_eq!(
            decrypt_content(ContentCipher::Aes128Cbc, &[0; 16], &[0; 16], b"short"),
            Err(DecryptionError::ContentDecryptionFailure)
        );
    }
}
