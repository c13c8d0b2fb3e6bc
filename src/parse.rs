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

//! Common parsing utilities.

/// A line in a byte buffer, located by offsets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Line {
    /// Offset of the first byte of the line.
    pub start: usize,
    /// Offset one past the last content byte, excluding the line break.
    pub end: usize,
    /// Offset of the first byte of the following line.
    pub next: usize,
}

impl Line {
    pub fn content<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.start..self.end]
    }
}

/// Splits bytes into lines. Both CRLF and LF are recognised as line breaks; a
/// final line without a line break is included if not empty.
pub fn lines(bytes: &[u8]) -> Vec<Line> {
    let mut result = vec![];
    let mut start = 0;

    while start < bytes.len() {
        match bytes[start..].iter().position(|&b| b == b'\n') {
            Some(i) => {
                let lf = start + i;
                let end = if lf > start && bytes[lf - 1] == b'\r' { lf - 1 } else { lf };
                result.push(Line { start, end, next: lf + 1 });
                start = lf + 1;
            }
            None => {
                result.push(Line { start, end: bytes.len(), next: bytes.len() });
                break;
            }
        }
    }

    result
}

/// Returns the length of the line break (CRLF or LF) ending just before
/// `offset`, or zero.
pub fn line_break_before(bytes: &[u8], offset: usize) -> usize {
    match &bytes[..offset] {
        [.., b'\r', b'\n'] => 2,
        [.., b'\n'] => 1,
        _ => 0,
    }
}

pub fn is_wsp(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

/// Removes folding line breaks from a header value.
pub fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_ok() {
        let bytes = b"ab\r\ncd\n\r\nx";
        let lines = lines(bytes);
        let contents: Vec<_> = lines.iter().map(|l| l.content(bytes)).collect();
        assert_eq!(contents, [&b"ab"[..], b"cd", b"", b"x"]);
        assert_eq!(lines[1].next, 7);

        assert!(super::lines(b"").is_empty());
        assert_eq!(super::lines(b"\n").len(), 1);
    }

    #[test]
    fn line_break_before_ok() {
        assert_eq!(line_break_before(b"a\r\nb", 3), 2);
        assert_eq!(line_break_before(b"a\nb", 2), 1);
        assert_eq!(line_break_before(b"ab", 1), 0);
        assert_eq!(line_break_before(b"ab", 0), 0);
    }

    #[test]
    fn unfold_ok() {
        assert_eq!(unfold("a;\r\n b"), "a; b");
        assert_eq!(unfold("a;\n\tb"), "a;\tb");
    }
}
