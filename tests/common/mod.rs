use std::{future::Future, io, pin::Pin, sync::Arc};
use tokio::fs;
use viasmime::dane::{DohRecord, DohResponse, LookupSmimea, SMIMEA_TYPE};

pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<DohResponse>> + Send + 'a>>;

#[derive(Clone)]
pub struct MockLookup(Arc<dyn Fn(&str) -> LookupFuture<'_> + Send + Sync>);

impl MockLookup {
    pub fn new(f: impl Fn(&str) -> LookupFuture<'_> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl LookupSmimea for MockLookup {
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<DohResponse>> + Send + 'a>>;

    fn lookup_smimea(&self, name: &str) -> Self::Query<'_> {
        let name = name.to_owned();

        Box::pin(async move { self.0(&name).await })
    }
}

pub async fn read_key_file(file_name: &str) -> io::Result<String> {
    fs::read_to_string(format!("tests/keys/{file_name}")).await
}

pub async fn read_data_file(file_name: &str) -> io::Result<String> {
    fs::read_to_string(format!("tests/data/{file_name}")).await
}

/// Returns the DER certificate contained in a PEM file, hex-encoded.
pub async fn read_certificate_hex(file_name: &str) -> io::Result<String> {
    let pem = read_key_file(file_name).await?;
    let der = viasmime::pem::decode(&pem)
        .map_err(|_| io::ErrorKind::InvalidData)?
        .into_iter()
        .next()
        .ok_or(io::ErrorKind::InvalidData)?;
    Ok(hex::encode_upper(der))
}

pub fn smimea_answer(name: &str, data: String) -> DohResponse {
    DohResponse {
        status: 0,
        recursion_desired: true,
        recursion_available: true,
        answer: vec![DohRecord {
            name: name.to_owned(),
            record_type: SMIMEA_TYPE,
            ttl: 300,
            data,
        }],
        ..Default::default()
    }
}
