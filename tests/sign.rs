pub mod common;

use std::time::{Duration, SystemTime};
use viasmime::{
    mime::MimePart,
    smime::{self, Config, SigningConfig, SmimeKind, VerificationFailure},
};

#[tokio::test]
async fn sign_verify_test_string() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("alice.key.pem").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();
    let other_cert = common::read_key_file("bob.cert.pem").await.unwrap();

    let message = smime::sign("testString", &key, &cert, &Config::default()).unwrap();

    let part = MimePart::parse(&message).unwrap();

    assert_eq!(part.content_type().mime_type(), "multipart/signed");
    assert_eq!(part.children().len(), 2);
    assert_eq!(part.children()[0].content_type().mime_type(), "text/plain");
    assert_eq!(
        part.children()[1].content_type().mime_type(),
        "application/pkcs7-signature"
    );

    let result = smime::verify(&message, &cert).unwrap();

    assert!(result.signature_verified);
    assert_eq!(result.failure, None);

    let result = smime::verify(&message, &other_cert).unwrap();

    assert!(!result.signature_verified);
}

#[tokio::test]
async fn tampered_content_fails() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("alice.key.pem").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();

    let message = smime::sign("testString", &key, &cert, &Config::default()).unwrap();

    let tampered = message.replacen("testString", "testStrinG", 1);

    let result = smime::verify(&tampered, &cert).unwrap();

    assert!(!result.signature_verified);
    assert_eq!(result.failure, Some(VerificationFailure::DigestMismatch));
}

#[tokio::test]
async fn line_endings_converted_to_lf() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("alice.key.pem").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();

    let message =
        smime::sign("first line\r\nsecond line\r\n", &key, &cert, &Config::default()).unwrap();

    let lf_message = message.replace("\r\n", "\n");

    assert!(smime::verify(&message, &cert).unwrap().signature_verified);
    assert!(smime::verify(&lf_message, &cert).unwrap().signature_verified);

    let crlf_again = lf_message.replace('\n', "\r\n");

    assert!(smime::verify(&crlf_again, &cert).unwrap().signature_verified);
}

#[tokio::test]
async fn trailing_whitespace_change_fails() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("alice.key.pem").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();

    let message = smime::sign("first line\r\nsecond line", &key, &cert, &Config::default()).unwrap();

    let tampered = message.replacen("first line\r\n", "first line \r\n", 1);

    assert!(!smime::verify(&tampered, &cert).unwrap().signature_verified);
}

#[tokio::test]
async fn verify_openssl_signed() {
    let _ = tracing_subscriber::fmt::try_init();

    let message = common::read_data_file("openssl-signed.eml").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();
    let other_cert = common::read_key_file("bob.cert.pem").await.unwrap();

    assert_eq!(smime::sniff(&message), SmimeKind::Signed);

    assert!(smime::verify(&message, &cert).unwrap().signature_verified);
    assert!(!smime::verify(&message, &other_cert).unwrap().signature_verified);

    assert_eq!(
        smime::get_signature_body(&message).unwrap(),
        "Signed by openssl.\r\nSecond line.\r\n"
    );
}

#[tokio::test]
async fn fixed_signing_time_is_reproducible() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("alice.key.pem").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();

    let config = Config {
        signing: SigningConfig {
            fixed_signing_time: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
            ..Default::default()
        },
        ..Default::default()
    };

    let signature = |message: &str| {
        let part = MimePart::parse(message).unwrap();
        part.children()[1].decoded_body().unwrap()
    };

    let message1 = smime::sign("same", &key, &cert, &config).unwrap();
    let message2 = smime::sign("same", &key, &cert, &config).unwrap();

    assert_eq!(signature(&message1), signature(&message2));
}

#[tokio::test]
async fn sign_opaque_verify() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("bob.key.pem").await.unwrap();
    let cert = common::read_key_file("bob.cert.pem").await.unwrap();
    let other_cert = common::read_key_file("alice.cert.pem").await.unwrap();

    let message = smime::sign_opaque("opaque\r\ncontent", &key, &cert, &Config::default()).unwrap();

    assert_eq!(smime::sniff(&message), SmimeKind::OpaqueSigned);
    assert!(smime::verify(&message, &cert).unwrap().signature_verified);
    assert_eq!(
        smime::verify(&message, &other_cert).unwrap().failure,
        Some(VerificationFailure::SignerMismatch)
    );
    assert_eq!(smime::get_signature_body(&message).unwrap(), "opaque\r\ncontent");
}

#[tokio::test]
async fn extra_headers_on_signed_message() {
    let _ = tracing_subscriber::fmt::try_init();

    let key = common::read_key_file("alice.key.pem").await.unwrap();
    let cert = common::read_key_file("alice.cert.pem").await.unwrap();

    let mut config = Config::default();
    config.build.extra_headers = vec![
        ("From".into(), "Alice <alice@example.com>".into()),
        ("Subject".into(), "Signed".into()),
    ];

    let message = smime::sign("body", &key, &cert, &config).unwrap();

    let part = MimePart::parse(&message).unwrap();

    assert_eq!(part.header("From"), Some("Alice <alice@example.com>"));
    assert_eq!(part.header("Subject"), Some("Signed"));
    assert!(part.header("Message-ID").unwrap().ends_with("@example.com>"));
    assert!(smime::verify(&message, &cert).unwrap().signature_verified);
}
