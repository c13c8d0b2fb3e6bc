use std::{env, process};
use viasmime::dane::{Config, DaneResolver};

/// Prints the certificate published for an email address in DNS.
#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut args = env::args();

    let (address, endpoint) = match (args.next().as_deref(), args.next(), args.next(), args.next()) {
        (_, Some(address), endpoint, None) => (address, endpoint),
        (program, ..) => {
            eprintln!("usage: {} <address> [<doh_endpoint>]", program.unwrap_or("smimea"));
            process::exit(1);
        }
    };

    let mut config = Config::default();
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }

    let resolver = DaneResolver::new(config);

    match resolver.resolve_certificate(&address).await {
        Ok(cert) => {
            eprintln!(
                "usage {}, selector {}, matching type {}",
                cert.cert_usage, cert.selector, cert.matching_type
            );
            print!("{}", cert.pem);
        }
        Err(e) => {
            eprintln!("{address}: {e}");
            process::exit(1);
        }
    }
}
