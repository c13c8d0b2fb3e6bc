use crate::dane::{lookup::LookupSmimea, SMIMEA_TYPE};
use reqwest::{header::ACCEPT, Client};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    io::{self, ErrorKind},
    pin::Pin,
};
use tracing::trace;

/// Media type of DNS-over-HTTPS JSON responses.
pub const DNS_JSON: &str = "application/dns-json";

/// A DNS-over-HTTPS JSON response, as served by Cloudflare and Google.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DohResponse {
    /// The DNS response code (0 NOERROR, 3 NXDOMAIN, …).
    pub status: u32,
    #[serde(rename = "TC", default)]
    pub truncated: bool,
    #[serde(rename = "RD", default)]
    pub recursion_desired: bool,
    #[serde(rename = "RA", default)]
    pub recursion_available: bool,
    #[serde(rename = "AD", default)]
    pub authentic_data: bool,
    #[serde(rename = "CD", default)]
    pub checking_disabled: bool,
    #[serde(default)]
    pub question: Vec<DohQuestion>,
    #[serde(default)]
    pub answer: Vec<DohRecord>,
    #[serde(default)]
    pub authority: Vec<DohRecord>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DohQuestion {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: u16,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DohRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: u16,
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    #[serde(default)]
    pub data: String,
}

/// A DNS-over-HTTPS client using the JSON API.
#[derive(Clone, Debug)]
pub struct DohClient {
    client: Client,
    endpoint: String,
}

impl DohClient {
    /// Creates a client for the given endpoint URL. An endpoint without a
    /// scheme (`cloudflare-dns.com/dns-query`) is taken to be HTTPS.
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: normalize_endpoint(endpoint),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LookupSmimea for DohClient {
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<DohResponse>> + Send + 'a>>;

    fn lookup_smimea(&self, name: &str) -> Self::Query<'_> {
        let name = name.to_owned();
        let rr_type = SMIMEA_TYPE.to_string();

        Box::pin(async move {
            trace!(endpoint = %self.endpoint, %name, "sending DoH query");

            let response = self
                .client
                .get(&self.endpoint)
                .query(&[("name", name.as_str()), ("type", rr_type.as_str())])
                .header(ACCEPT, DNS_JSON)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(to_io_error)?;

            let body = response.bytes().await.map_err(to_io_error)?;

            serde_json::from_slice(&body).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
        })
    }
}

pub(crate) fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();

    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        endpoint.to_owned()
    } else {
        format!("https://{endpoint}")
    }
}

fn to_io_error(e: reqwest::Error) -> io::Error {
    let kind = if e.is_timeout() {
        ErrorKind::TimedOut
    } else if e.is_builder() {
        ErrorKind::InvalidInput
    } else {
        ErrorKind::Other
    };

    io::Error::new(kind, e)
}
