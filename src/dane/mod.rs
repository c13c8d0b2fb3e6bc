// viasmime – S/MIME messaging with DANE certificate discovery
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Certificate discovery through DANE SMIMEA records (RFC 8162).
//!
//! The certificate for an email address is published at the domain
//! `<hash>._smimecert.<domain>`, where `<hash>` is the hex-encoded SHA-256
//! digest of the local part, truncated to 28 octets. [`DaneResolver`] looks up
//! this domain with DNS-over-HTTPS and returns the certificate found there.
//!
//! Only records with selector 0 (full certificate) and matching type 0 (exact
//! match) are supported, since the others do not carry a certificate. The
//! certificate usage is reported but not evaluated: the certificate returned
//! is an end-entity certificate without any PKIX or DNSSEC validation beyond
//! what the resolver reports in [`DohResponse::authentic_data`].
//!
//! Resolved certificates are not cached, and failed lookups are not retried.

mod doh;
mod lookup;
pub mod record;

pub use self::{
    doh::{DohClient, DohQuestion, DohRecord, DohResponse, DNS_JSON},
    lookup::LookupSmimea,
    record::SmimeaRecord,
};

use crate::{
    crypto::{self, Certificate, CertificateError, DigestAlgorithm},
    pem::{self, PemLabel},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::ErrorKind,
    time::Duration,
};
use tokio::time;
use tracing::{debug, trace};

/// The DNS resource record type code of SMIMEA.
pub const SMIMEA_TYPE: u16 = 53;

/// The default DNS-over-HTTPS endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://cloudflare-dns.com/dns-query";

/// Length in octets of the truncated local-part digest in the query name.
const LOCAL_PART_HASH_LEN: usize = 28;

/// Configuration of the DANE resolver.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Config {
    /// The DNS-over-HTTPS endpoint URL. The `https://` scheme may be omitted.
    pub endpoint: String,
    /// Timeout for the lookup of a record.
    pub lookup_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            lookup_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DaneError {
    InvalidAddress,
    Lookup,
    Timeout,
    InvalidResponse,
    RecordNotFound,
    AuthorityMismatch,
    InvalidRecordData,
    UnsupportedRecord,
}

impl Display for DaneError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "invalid email address"),
            Self::Lookup => write!(f, "SMIMEA record lookup failed"),
            Self::Timeout => write!(f, "SMIMEA record lookup timed out"),
            Self::InvalidResponse => write!(f, "invalid DNS response"),
            Self::RecordNotFound => write!(f, "no SMIMEA record found"),
            Self::AuthorityMismatch => write!(f, "resolver is not authoritative for SMIMEA records"),
            Self::InvalidRecordData => write!(f, "invalid SMIMEA record data"),
            Self::UnsupportedRecord => write!(f, "unsupported SMIMEA selector or matching type"),
        }
    }
}

impl Error for DaneError {}

/// A certificate obtained from an SMIMEA record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DaneCertificate {
    pub cert_usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    /// The DER-encoded certificate.
    pub der: Vec<u8>,
    /// The certificate as a PEM document.
    pub pem: String,
}

impl DaneCertificate {
    pub fn from_record(record: SmimeaRecord) -> Result<Self, DaneError> {
        if !record.is_full_certificate() {
            return Err(DaneError::UnsupportedRecord);
        }

        let pem = pem::encode(PemLabel::Certificate, &record.data)
            .map_err(|_| DaneError::InvalidRecordData)?;

        Ok(Self {
            cert_usage: record.cert_usage,
            selector: record.selector,
            matching_type: record.matching_type,
            der: record.data,
            pem,
        })
    }

    /// Parses the certificate.
    pub fn certificate(&self) -> Result<Certificate, CertificateError> {
        Certificate::from_der(&self.der)
    }
}

/// Returns the SMIMEA query name for an email address.
///
/// The local part is hashed exactly as given; the domain is converted to
/// A-label form.
///
/// # Examples
///
/// ```
/// use viasmime::dane::query_name;
///
/// let name = query_name("hugh@example.com").unwrap();
///
/// assert_eq!(
///     name,
///     "c93f1e400f26708f98cb19d936620da35eec8f72e57f9eec01c1afd6._smimecert.example.com"
/// );
/// ```
pub fn query_name(address: &str) -> Result<String, DaneError> {
    let address = address.trim();
    let address = address
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(address);

    let (local_part, domain) = address.rsplit_once('@').ok_or(DaneError::InvalidAddress)?;
    if local_part.is_empty() || domain.is_empty() {
        return Err(DaneError::InvalidAddress);
    }

    let domain = idna::domain_to_ascii(domain).map_err(|_| DaneError::InvalidAddress)?;
    let domain = domain.trim_end_matches('.');
    if domain.is_empty() {
        return Err(DaneError::InvalidAddress);
    }

    let digest = crypto::digest(DigestAlgorithm::Sha256, local_part.as_bytes());
    let hash = hex::encode(&digest[..LOCAL_PART_HASH_LEN]);

    Ok(format!("{hash}._smimecert.{domain}"))
}

/// Selects and decodes the SMIMEA record in a DoH response.
pub fn evaluate_response(response: &DohResponse) -> Result<SmimeaRecord, DaneError> {
    // An authority record of another type (usually SOA) means the resolver
    // does not have the zone's SMIMEA records.
    if response.authority.iter().any(|r| r.record_type != SMIMEA_TYPE) {
        return Err(DaneError::AuthorityMismatch);
    }

    // NOERROR and NXDOMAIN are regular answers, anything else a failure.
    if !matches!(response.status, 0 | 3) {
        trace!(status = response.status, "DNS query failed");
        return Err(DaneError::InvalidResponse);
    }

    let answer = response
        .answer
        .iter()
        .find(|r| r.record_type == SMIMEA_TYPE)
        .ok_or(DaneError::RecordNotFound)?;

    SmimeaRecord::from_rdata(&answer.data).map_err(|e| {
        trace!(data = %answer.data, "could not parse SMIMEA record: {e}");
        DaneError::InvalidRecordData
    })
}

/// A resolver for certificates published in DANE SMIMEA records.
///
/// # Examples
///
/// ```no_run
/// # async fn f() -> Result<(), viasmime::dane::DaneError> {
/// use viasmime::dane::{Config, DaneResolver};
///
/// let resolver = DaneResolver::new(Config::default());
///
/// let cert = resolver.resolve_certificate("hugh@example.com").await?;
///
/// println!("{}", cert.pem);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DaneResolver<T> {
    lookup: T,
    config: Config,
}

impl DaneResolver<DohClient> {
    /// Creates a resolver querying the configured DNS-over-HTTPS endpoint.
    pub fn new(config: Config) -> Self {
        let lookup = DohClient::new(&config.endpoint);
        Self { lookup, config }
    }
}

impl<T: LookupSmimea> DaneResolver<T> {
    pub fn with_lookup(lookup: T, config: Config) -> Self {
        Self { lookup, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves the certificate published for an email address.
    pub async fn resolve_certificate(&self, address: &str) -> Result<DaneCertificate, DaneError> {
        let name = query_name(address)?;

        trace!(%name, "looking up SMIMEA record");

        let query = self.lookup.lookup_smimea(&name);

        let response = match time::timeout(self.config.lookup_timeout, query).await {
            Ok(r) => r.map_err(|e| {
                trace!(%name, "SMIMEA lookup failed: {e}");
                match e.kind() {
                    ErrorKind::InvalidInput => DaneError::InvalidAddress,
                    ErrorKind::NotFound => DaneError::RecordNotFound,
                    ErrorKind::TimedOut => DaneError::Timeout,
                    ErrorKind::InvalidData => DaneError::InvalidResponse,
                    _ => DaneError::Lookup,
                }
            })?,
            Err(_) => return Err(DaneError::Timeout),
        };

        let record = evaluate_response(&response)?;

        let certificate = DaneCertificate::from_record(record)?;

        debug!(
            %name,
            cert_usage = certificate.cert_usage,
            authentic_data = response.authentic_data,
            "resolved SMIMEA certificate"
        );

        Ok(certificate)
    }
}
