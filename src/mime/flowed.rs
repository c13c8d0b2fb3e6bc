//! Format=flowed text (RFC 3676).
//!
//! Long lines are broken into soft line breaks, which end in a space; lines
//! are then space-stuffed so that no line starts with a space, `From`, or `>`.

const LINE_WIDTH: usize = 76;

/// Encodes text as format=flowed with CRLF line endings.
///
/// ```
/// use viasmime::mime::flowed;
///
/// let text = "From here on, a line";
/// assert_eq!(flowed::encode(text), " From here on, a line");
/// assert_eq!(flowed::decode(&flowed::encode(text)), text);
/// ```
pub fn encode(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    let lines: Vec<_> = text
        .split('\n')
        .flat_map(|line| fold(trim_hard_line(line), LINE_WIDTH))
        .map(|line| stuff(&line))
        .collect();

    lines.join("\r\n")
}

/// Decodes format=flowed text: removes space-stuffing and joins soft line
/// breaks. Hard line breaks are returned as CRLF.
pub fn decode(text: &str) -> String {
    let text = text.replace("\r\n", "\n");

    let mut result = String::with_capacity(text.len());
    let mut lines = text.split('\n').peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_prefix(' ').unwrap_or(line);
        result.push_str(line);

        // the signature separator is never a soft break
        let soft = line.ends_with(' ') && line != "-- ";
        if !soft && lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

// Breaks a line after spaces so that each resulting line (including the
// trailing space) fits the width where possible.
fn fold(line: &str, width: usize) -> Vec<String> {
    let mut result = vec![];
    let mut rest = line;

    // leave room for space-stuffing
    let width = width - 1;

    while rest.chars().count() > width {
        let limit = rest.char_indices().nth(width).map_or(rest.len(), |(i, _)| i);

        let spaces: Vec<_> = rest
            .char_indices()
            .filter(|&(i, c)| c == ' ' && i > 0)
            .map(|(i, _)| i + 1)
            .collect();

        let at = spaces
            .iter()
            .rev()
            .find(|&&i| i <= limit)
            .or_else(|| spaces.first())
            .copied();

        match at {
            Some(i) if i < rest.len() => {
                let (head, tail) = rest.split_at(i);
                result.push(head.to_owned());
                rest = tail;
            }
            _ => break,
        }
    }
    result.push(rest.to_owned());

    result
}

// A trailing space would turn the following hard break into a soft one.
fn trim_hard_line(line: &str) -> &str {
    if line == "-- " {
        line
    } else {
        line.trim_end_matches(' ')
    }
}

fn stuff(line: &str) -> String {
    if line.starts_with(' ') || line.starts_with("From") || line.starts_with('>') {
        format!(" {line}")
    } else {
        line.to_owned()
    }
}
