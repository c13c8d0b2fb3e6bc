//! Canonicalization utilities.
//!
//! Content covered by an S/MIME signature is digested in canonical form, that
//! is, with every line ending converted to CRLF (RFC 8551, section 3.1.1).

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const CRLF: [u8; 2] = [CR, LF];

// which state are we in = what did we see last?
#[derive(Copy, Clone)]
enum CanonState {
    Init,
    Cr,
    Byte,
}

/// A canonicalizer converting LF line endings to CRLF.
///
/// Input can be fed in chunks; a CR at the end of one chunk and an LF at the
/// beginning of the next are recognised as one line ending.
pub struct LineEndingCanonicalizer {
    state: CanonState,
}

impl LineEndingCanonicalizer {
    pub fn new() -> Self {
        Self { state: CanonState::Init }
    }

    pub fn canon_chunk(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(bytes.len() + bytes.len() / 32);

        for &b in bytes {
            match (self.state, b) {
                (CanonState::Cr, LF) => {
                    result.push(LF);
                    self.state = CanonState::Init;
                }
                (_, LF) => {
                    result.extend(CRLF);
                    self.state = CanonState::Init;
                }
                (_, CR) => {
                    result.push(CR);
                    self.state = CanonState::Cr;
                }
                (_, b) => {
                    result.push(b);
                    self.state = CanonState::Byte;
                }
            }
        }

        result
    }
}

impl Default for LineEndingCanonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts all line endings in the input to CRLF.
pub fn canonicalize_line_endings(bytes: &[u8]) -> Vec<u8> {
    LineEndingCanonicalizer::new().canon_chunk(bytes)
}
