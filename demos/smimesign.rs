use std::{env, process};
use tokio::{
    fs,
    io::{self, AsyncReadExt},
};
use viasmime::{smime::SmimeEngine, Config};

/// Signs the text on stdin, or verifies a signed message with `--verify`.
#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut args = env::args();

    let (verify, key_file, cert_file) = match (
        args.next().as_deref(),
        args.next().as_deref(),
        args.next(),
        args.next(),
    ) {
        (_, Some("--verify"), Some(cert_file), None) => (true, None, cert_file),
        (_, Some(key_file), Some(cert_file), None) => (false, Some(key_file.to_owned()), cert_file),
        (program, ..) => {
            let program = program.unwrap_or("smimesign");
            eprintln!("usage: {program} <key_file> <cert_file>");
            eprintln!("       {program} --verify <cert_file>");
            process::exit(1);
        }
    };

    let cert = fs::read_to_string(cert_file).await.unwrap();

    let mut input = String::new();
    let n = io::stdin().read_to_string(&mut input).await.unwrap();
    assert!(n > 0, "empty input on stdin");

    let engine = SmimeEngine::new(Config::default());

    if verify {
        match engine.verify(input, cert).await {
            Ok(result) if result.signature_verified => println!("signature verified"),
            Ok(result) => {
                println!("signature not verified: {}", result.failure.unwrap());
                process::exit(2);
            }
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
    } else {
        let key = fs::read_to_string(key_file.unwrap()).await.unwrap();

        let message = engine.sign(input, key, cert).await.unwrap();

        print!("{message}");
    }
}
