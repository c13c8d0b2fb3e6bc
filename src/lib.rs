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

//! A library for *Secure/MIME* (S/MIME) messaging as described in [RFC 8551],
//! with certificate discovery through *DANE* SMIMEA records ([RFC 8162]).
//!
//! The high-level API in module `smime` encrypts, decrypts, signs and verifies
//! email message text. It takes and returns complete MIME entities as
//! strings, and PEM-encoded certificates and keys. Module `dane` looks up the
//! certificate of an email address with DNS-over-HTTPS. For convenience, the
//! relevant items are re-exported at the top level.
//!
//! The building blocks beneath are public, too: a MIME builder and parser
//! (module `mime`), CMS `EnvelopedData` and `SignedData` handling (module
//! `cms`), the cryptographic primitives (module `crypto`), as well as PEM,
//! header and Quoted-Printable codecs.
//!
//! # Usage
//!
//! The functions [`smime::encrypt`], [`smime::decrypt`], [`smime::sign`] and
//! [`smime::verify`] are the entry points for synchronous use. The
//! [`SmimeEngine`] offers the same operations for asynchronous code, and the
//! [`DaneResolver`] resolves certificates.
//!
//! Diagnostics are emitted as [`tracing`] events. Nothing is logged unless the
//! application installs a subscriber.
//!
//! # Cargo features
//!
//! The feature **`sha1`** enables dependency `sha1` and thereby the historic
//! SHA-1 hash algorithm for RSAES-OAEP key transport. SHA-1 is the default
//! hash of RSAES-OAEP when its parameters are absent, so messages from some
//! older clients can only be decrypted with this feature. It is never used
//! for encryption unless configured explicitly.
//!
//! [RFC 8551]: https://www.rfc-editor.org/rfc/rfc8551
//! [RFC 8162]: https://www.rfc-editor.org/rfc/rfc8162

pub mod canonicalize;
pub mod cms;
pub mod crypto;
pub mod dane;
pub mod header;
pub mod mime;
mod parse;
pub mod pem;
pub mod quoted_printable;
pub mod smime;
mod util;

pub use crate::{
    crypto::{Certificate, ContentCipher, DigestAlgorithm, OaepHash, PrivateKey},
    dane::{DaneCertificate, DaneError, DaneResolver, DohClient, LookupSmimea},
    mime::{MimeBuilder, MimeParseError, MimePart, NodeId},
    pem::PemError,
    smime::{Config, SmimeEngine, SmimeError, SmimeKind, VerificationResult},
    util::{decode_base64, encode_base64, Base64Error, CanonicalStr},
};
