use crate::dane::DohResponse;
use std::{future::Future, io};

/// A trait for looking up DNS SMIMEA records (type 53).
///
/// The error type used here is `std::io::Error`. The following error kinds on
/// the query result are recognised and receive special treatment.
///
/// * `ErrorKind::InvalidInput`: the query name could not be used
/// * `ErrorKind::NotFound`: NXDOMAIN, no record found
/// * `ErrorKind::TimedOut`: timeout
///
/// The answer has the shape of a DNS-over-HTTPS JSON response, whatever the
/// transport.
pub trait LookupSmimea: Send + Sync {
    /// The future resolving to the query’s answer.
    type Query<'a>: Future<Output = io::Result<DohResponse>> + Send + 'a
    where
        Self: 'a;

    /// Looks up the SMIMEA records of the given name.
    ///
    /// The name is passed as a string in A-label (ASCII) format (eg
    /// `<hash>._smimecert.example.com`).
    fn lookup_smimea(&self, name: &str) -> Self::Query<'_>;
}
