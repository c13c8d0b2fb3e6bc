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

//! Building and parsing MIME messages.
//!
//! Messages are assembled as trees of nodes in a [`MimeBuilder`] arena and
//! serialised with [`MimeBuilder::build`]. Received messages are parsed into
//! [`MimePart`]s.

pub mod address;
mod build;
pub mod flowed;
mod parse;
pub mod types;

pub use self::{
    build::{Content, Envelope, MimeBuilder, NodeId, NodeOptions},
    parse::MimePart,
};

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// An error that occurs when wire text is not a usable MIME or S/MIME
/// structure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MimeParseError {
    EmptyInput,
    MissingBoundary,
    InvalidTransferEncoding,
    NotSmime,
    UnexpectedPartCount(usize),
    MissingSignaturePart,
}

impl Display for MimeParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "empty message"),
            Self::MissingBoundary => write!(f, "multipart entity without usable boundary"),
            Self::InvalidTransferEncoding => write!(f, "body does not match its transfer encoding"),
            Self::NotSmime => write!(f, "not an S/MIME message"),
            Self::UnexpectedPartCount(n) => {
                write!(f, "signed message has {n} parts instead of two")
            }
            Self::MissingSignaturePart => write!(f, "signed message has no signature part"),
        }
    }
}

impl Error for MimeParseError {}
