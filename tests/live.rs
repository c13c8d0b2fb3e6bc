use viasmime::dane::{Config, DaneError, DaneResolver};

/// Look up a real SMIMEA record through the default DoH endpoint.
#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_resolve() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = DaneResolver::new(Config::default());

    match resolver.resolve_certificate("dbuergin@gluet.ch").await {
        Ok(cert) => {
            assert!(cert.pem.starts_with("-----BEGIN CERTIFICATE-----"));
            cert.certificate().unwrap();
        }
        Err(e) => assert!(
            matches!(e, DaneError::RecordNotFound | DaneError::AuthorityMismatch),
            "unexpected error: {e}"
        ),
    }
}

/// A domain without SMIMEA records.
#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_not_found() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = DaneResolver::new(Config {
        endpoint: "cloudflare-dns.com/dns-query".into(),
        ..Default::default()
    });

    let result = resolver.resolve_certificate("nobody@example.com").await;

    assert!(matches!(
        result,
        Err(DaneError::RecordNotFound | DaneError::AuthorityMismatch)
    ));
}
