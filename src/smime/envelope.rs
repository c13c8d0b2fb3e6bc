use crate::{
    cms::{self, Recipient},
    crypto::{Certificate, DecryptionError, PrivateKey},
    mime::{MimeParseError, MimePart},
    smime::{build_cms_entity, sniff_part, Config, SmimeError, SmimeKind},
};
use tracing::debug;

pub(crate) const ENVELOPED_CONTENT_TYPE: &str =
    "application/pkcs7-mime; name=smime.p7m; smime-type=enveloped-data";

/// Encrypts text for the holder of a certificate, returning an
/// `application/pkcs7-mime` message.
///
/// # Examples
///
/// ```no_run
/// # fn f(cert_pem: &str) -> Result<(), viasmime::smime::SmimeError> {
/// use viasmime::smime::{self, Config};
///
/// let message = smime::encrypt("hello world", cert_pem, &Config::default())?;
///
/// assert!(message.contains("smime-type=enveloped-data"));
/// # Ok(())
/// # }
/// ```
pub fn encrypt(plaintext: &str, certificate_pem: &str, config: &Config) -> Result<String, SmimeError> {
    let certificate = Certificate::from_pem(certificate_pem)?;
    let recipient = Recipient::from_certificate(&certificate)?;

    let der = cms::encrypt_enveloped(
        plaintext.as_bytes(),
        &recipient,
        config.encryption.oaep_hash,
        config.encryption.content_cipher,
    )?;

    debug!(subject = %certificate.subject(), "encrypted message");

    Ok(build_cms_entity(
        ENVELOPED_CONTENT_TYPE,
        "Enveloped Data",
        "smime.p7m",
        der,
        &config.build,
    ))
}

/// Decrypts an `application/pkcs7-mime` enveloped message with a private key.
/// The decrypted content must be UTF-8.
pub fn decrypt(smime_text: &str, private_key_pem: &str) -> Result<String, SmimeError> {
    let private_key = PrivateKey::from_pkcs8_pem(private_key_pem)?;

    let part = MimePart::parse(smime_text)?;
    if sniff_part(&part) != SmimeKind::Enveloped {
        return Err(MimeParseError::NotSmime.into());
    }

    let der = part.decoded_body()?;
    let plaintext = cms::decrypt_enveloped(&der, &private_key)?;

    debug!(len = plaintext.len(), "decrypted message");

    String::from_utf8(plaintext).map_err(|_| DecryptionError::InvalidUtf8.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::{ContentCipher, OaepHash},
        smime::{sniff, BuildOptions, EncryptionConfig},
    };

    const ALICE_CERT: &str = include_str!("../../tests/keys/alice.cert.pem");
    const ALICE_KEY: &str = include_str!("../../tests/keys/alice.key.pem");
    const BOB_KEY: &str = include_str!("../../tests/keys/bob.key.pem");

    #[test]
    fn encrypt_decrypt() {
        let message = encrypt("grüße\r\nzweite Zeile", ALICE_CERT, &Config::default()).unwrap();

        assert_eq!(sniff(&message), SmimeKind::Enveloped);
        assert!(message.contains("Content-Disposition: attachment; filename=smime.p7m\r\n"));
        assert!(message.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(message.contains("Content-Description: Enveloped Data\r\n"));

        assert_eq!(decrypt(&message, ALICE_KEY).unwrap(), "grüße\r\nzweite Zeile");
    }

    #[test]
    fn encrypt_with_options() {
        let config = Config {
            encryption: EncryptionConfig {
                oaep_hash: OaepHash::Sha512,
                content_cipher: ContentCipher::Aes256Cbc,
            },
            build: BuildOptions {
                extra_headers: vec![
                    ("from".into(), "Alice <alice@example.com>".into()),
                    ("subject".into(), "Geheim".into()),
                ],
                ..Default::default()
            },
            ..Default::default()
        };

        let message = encrypt("x", ALICE_CERT, &config).unwrap();

        assert!(message.contains("From: Alice <alice@example.com>\r\n"));
        assert!(message.contains("Subject: Geheim\r\n"));
        assert!(message.contains("@example.com>\r\n"));
        assert_eq!(decrypt(&message, ALICE_KEY).unwrap(), "x");
    }

    #[test]
    fn decrypt_errors() {
        let message = encrypt("x", ALICE_CERT, &Config::default()).unwrap();

        assert_eq!(
            decrypt(&message, BOB_KEY),
            Err(SmimeError::Decryption(DecryptionError::NoMatchingRecipient))
        );
        assert_eq!(
            decrypt("Content-Type: text/plain\r\n\r\nx", ALICE_KEY),
            Err(SmimeError::MimeParse(MimeParseError::NotSmime))
        );
        assert_eq!(decrypt("", ALICE_KEY), Err(SmimeError::MimeParse(MimeParseError::EmptyInput)));
        assert!(matches!(encrypt("x", "garbage", &Config::default()), Err(SmimeError::Pem(_))));
    }
}
