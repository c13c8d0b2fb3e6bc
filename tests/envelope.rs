pub mod common;

use viasmime::{
    crypto::{ContentCipher, DecryptionError, OaepHash},
    mime::MimePart,
    smime::{self, Config, EncryptionConfig, SmimeError, SmimeKind},
};

#[tokio::test]
async fn encrypt_decrypt_hello_world() {
    let _ = tracing_subscriber::fmt::try_init();

    let cert = common::read_key_file("alice.cert.pem").await.unwrap();
    let key = common::read_key_file("alice.key.pem").await.unwrap();

    let message = smime::encrypt("hello world", &cert, &Config::default()).unwrap();

    let part = MimePart::parse(&message).unwrap();

    let content_type = part.content_type();

    assert_eq!(content_type.mime_type(), "application/pkcs7-mime");
    assert_eq!(content_type.param("smime-type"), Some("enveloped-data"));
    assert_eq!(content_type.param("name"), Some("smime.p7m"));
    assert_eq!(part.header("Content-Description"), Some("Enveloped Data"));
    assert_eq!(part.header("Content-Transfer-Encoding"), Some("base64"));
    assert_eq!(part.header("MIME-Version"), Some("1.0"));

    let plaintext = smime::decrypt(&message, &key).unwrap();

    assert_eq!(plaintext, "hello world");
}

#[tokio::test]
async fn encrypt_all_ciphers() {
    let _ = tracing_subscriber::fmt::try_init();

    let cert = common::read_key_file("bob.cert.pem").await.unwrap();
    let key = common::read_key_file("bob.key.pem").await.unwrap();

    for content_cipher in ContentCipher::all() {
        for oaep_hash in OaepHash::all() {
            let config = Config {
                encryption: EncryptionConfig {
                    oaep_hash,
                    content_cipher,
                },
                ..Default::default()
            };

            let message = smime::encrypt("Grüße\r\nzweite Zeile", &cert, &config).unwrap();

            assert_eq!(smime::sniff(&message), SmimeKind::Enveloped);
            assert_eq!(smime::decrypt(&message, &key).unwrap(), "Grüße\r\nzweite Zeile");
        }
    }
}

#[tokio::test]
async fn decrypt_with_wrong_key() {
    let _ = tracing_subscriber::fmt::try_init();

    let cert = common::read_key_file("alice.cert.pem").await.unwrap();
    let key = common::read_key_file("bob.key.pem").await.unwrap();

    let message = smime::encrypt("secret", &cert, &Config::default()).unwrap();

    assert_eq!(
        smime::decrypt(&message, &key),
        Err(SmimeError::Decryption(DecryptionError::NoMatchingRecipient))
    );
}

#[tokio::test]
async fn decrypt_openssl_oaep_sha256() {
    let _ = tracing_subscriber::fmt::try_init();

    let message = common::read_data_file("openssl-oaep-sha256.eml").await.unwrap();
    let key = common::read_key_file("alice.key.pem").await.unwrap();

    assert_eq!(smime::sniff(&message), SmimeKind::Enveloped);
    assert_eq!(smime::decrypt(&message, &key).unwrap(), "hello from openssl");
}

#[tokio::test]
async fn decrypt_openssl_pkcs1() {
    let _ = tracing_subscriber::fmt::try_init();

    let message = common::read_data_file("openssl-pkcs1.eml").await.unwrap();
    let key = common::read_key_file("alice.key.pem").await.unwrap();

    assert_eq!(smime::decrypt(&message, &key).unwrap(), "hello from openssl");
}

#[tokio::test]
async fn decrypt_tampered_message() {
    let _ = tracing_subscriber::fmt::try_init();

    let cert = common::read_key_file("alice.cert.pem").await.unwrap();
    let key = common::read_key_file("alice.key.pem").await.unwrap();

    let message = smime::encrypt("hello world", &cert, &Config::default()).unwrap();

    let (header, body) = message.split_once("\r\n\r\n").unwrap();
    let body = body.replace(|c: char| c.is_ascii_alphanumeric(), "A");
    let tampered = format!("{header}\r\n\r\n{body}");

    assert!(smime::decrypt(&tampered, &key).is_err());
}
