pub mod common;

use common::MockLookup;
use std::{io::ErrorKind, time::Duration};
use viasmime::{
    dane::{self, Config, DaneError, DaneResolver, DohRecord, DohResponse},
    smime::{self, Config as SmimeConfig},
};

const HUGH_NAME: &str =
    "c93f1e400f26708f98cb19d936620da35eec8f72e57f9eec01c1afd6._smimecert.example.com";

#[tokio::test]
async fn resolve_generic_rdata() {
    let _ = tracing_subscriber::fmt::try_init();

    let cert_hex = common::read_certificate_hex("alice.cert.pem").await.unwrap();

    let resolver = MockLookup::new(move |name| {
        let data = format!(r"\# {} 000000{}", cert_hex.len() / 2 + 3, cert_hex);
        Box::pin(async move {
            match name {
                HUGH_NAME => Ok(common::smimea_answer(name, data)),
                _ => Err(ErrorKind::NotFound.into()),
            }
        })
    });

    let resolver = DaneResolver::with_lookup(resolver, Config::default());

    let cert = resolver.resolve_certificate("hugh@example.com").await.unwrap();

    assert_eq!((cert.cert_usage, cert.selector, cert.matching_type), (0, 0, 0));
    assert_eq!(
        hex::encode_upper(&cert.der),
        common::read_certificate_hex("alice.cert.pem").await.unwrap()
    );

    let original = common::read_key_file("alice.cert.pem").await.unwrap();

    assert_eq!(cert.pem.trim(), original.trim());
    assert!(cert.certificate().unwrap().subject().contains("alice@example.com"));
}

#[tokio::test]
async fn resolved_certificate_encrypts() {
    let _ = tracing_subscriber::fmt::try_init();

    let cert_hex = common::read_certificate_hex("bob.cert.pem").await.unwrap();

    let resolver = MockLookup::new(move |name| {
        let data = format!("3 0 0 {cert_hex}");
        Box::pin(async move { Ok(common::smimea_answer(name, data)) })
    });

    let resolver = DaneResolver::with_lookup(resolver, Config::default());

    let cert = resolver.resolve_certificate("bob@example.org").await.unwrap();

    assert_eq!(cert.cert_usage, 3);

    let key = common::read_key_file("bob.key.pem").await.unwrap();

    let message = smime::encrypt("found via DANE", &cert.pem, &SmimeConfig::default()).unwrap();

    assert_eq!(smime::decrypt(&message, &key).unwrap(), "found via DANE");
}

#[tokio::test]
async fn empty_answer_is_record_not_found() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = MockLookup::new(|_| {
        Box::pin(async {
            Ok(DohResponse {
                status: 0,
                ..Default::default()
            })
        })
    });

    let resolver = DaneResolver::with_lookup(resolver, Config::default());

    let result = resolver.resolve_certificate("hugh@example.com").await;

    assert_eq!(result, Err(DaneError::RecordNotFound));
}

#[tokio::test]
async fn authority_soa_is_authority_mismatch() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = MockLookup::new(|_| {
        Box::pin(async {
            let json = r#"{
                "Status": 3, "TC": false, "RD": true, "RA": true, "AD": false, "CD": false,
                "Question": [{ "name": "x._smimecert.example.com.", "type": 53 }],
                "Authority": [{
                    "name": "example.com.", "type": 6, "TTL": 1800,
                    "data": "ns.example.com. hostmaster.example.com. 2023010101 7200 3600 1209600 3600"
                }]
            }"#;
            Ok(serde_json::from_str(json).unwrap())
        })
    });

    let resolver = DaneResolver::with_lookup(resolver, Config::default());

    let result = resolver.resolve_certificate("hugh@example.com").await;

    assert_eq!(result, Err(DaneError::AuthorityMismatch));
}

#[tokio::test]
async fn lookup_errors() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = MockLookup::new(|name| {
        Box::pin(async move {
            if name.ends_with(".nxdomain.example") {
                Err(ErrorKind::NotFound.into())
            } else {
                Err(ErrorKind::ConnectionRefused.into())
            }
        })
    });

    let resolver = DaneResolver::with_lookup(resolver, Config::default());

    assert_eq!(
        resolver.resolve_certificate("a@nxdomain.example").await,
        Err(DaneError::RecordNotFound)
    );
    assert_eq!(
        resolver.resolve_certificate("a@example.com").await,
        Err(DaneError::Lookup)
    );
    assert_eq!(
        resolver.resolve_certificate("not an address").await,
        Err(DaneError::InvalidAddress)
    );
}

#[tokio::test]
async fn unsupported_matching_type() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = MockLookup::new(|name| {
        let data = "3 1 1 8A4B6C3E1F2D".to_owned();
        Box::pin(async move { Ok(common::smimea_answer(name, data)) })
    });

    let resolver = DaneResolver::with_lookup(resolver, Config::default());

    let result = resolver.resolve_certificate("hugh@example.com").await;

    assert_eq!(result, Err(DaneError::UnsupportedRecord));
}

#[tokio::test(start_paused = true)]
async fn lookup_timeout() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = MockLookup::new(|_| {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(DohResponse::default())
        })
    });

    let config = Config {
        lookup_timeout: Duration::from_secs(5),
        ..Default::default()
    };

    let resolver = DaneResolver::with_lookup(resolver, config);

    let result = resolver.resolve_certificate("hugh@example.com").await;

    assert_eq!(result, Err(DaneError::Timeout));
}

#[test]
fn answer_records_of_other_types_are_skipped() {
    let response = DohResponse {
        answer: vec![
            DohRecord {
                name: HUGH_NAME.into(),
                record_type: 5,
                ttl: 60,
                data: "alias.example.com.".into(),
            },
            DohRecord {
                name: "alias.example.com.".into(),
                record_type: 53,
                ttl: 60,
                data: r"\# 4 02000001".into(),
            },
        ],
        ..Default::default()
    };

    let record = dane::evaluate_response(&response).unwrap();

    assert_eq!(record.cert_usage, 2);
    assert_eq!(record.data, [1]);
}

#[test]
fn query_name_matches_rfc_example() {
    assert_eq!(dane::query_name("hugh@example.com").unwrap(), HUGH_NAME);
}
