//! Address list parsing.
//!
//! The parser is tolerant: it accepts bare addresses, display names with
//! angle-bracketed addresses, quoted display names, comments, and groups.

use crate::header;
use std::fmt::Write;

/// A single mailbox from an address list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Address {
    pub name: String,
    pub address: String,
}

/// Parses an address list such as the value of a `To` header.
///
/// Group syntax (`Team: a@example.com, b@example.com;`) is flattened into the
/// member addresses. Entries without an address are returned with an empty
/// `address`.
///
/// ```
/// use viasmime::mime::address::parse_addresses;
///
/// let addrs = parse_addresses("\"Doe, Jane\" <jane@example.com>, bob@example.org");
/// assert_eq!(addrs[0].name, "Doe, Jane");
/// assert_eq!(addrs[0].address, "jane@example.com");
/// assert_eq!(addrs[1].address, "bob@example.org");
/// ```
pub fn parse_addresses(value: &str) -> Vec<Address> {
    let value = crate::parse::unfold(value);

    split_entries(&value)
        .into_iter()
        .filter_map(|entry| parse_entry(&entry))
        .collect()
}

// splits at top-level `,` and `;`, and drops group display names
fn split_entries(value: &str) -> Vec<String> {
    let mut entries = vec![];
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    let mut angle = false;
    let mut comment_depth = 0usize;

    for c in value.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted || comment_depth > 0 => {
                current.push(c);
                escaped = true;
            }
            '"' if comment_depth == 0 => {
                quoted = !quoted;
                current.push(c);
            }
            '(' if !quoted => {
                comment_depth += 1;
                current.push(c);
            }
            ')' if !quoted && comment_depth > 0 => {
                comment_depth -= 1;
                current.push(c);
            }
            '<' if !quoted && comment_depth == 0 => {
                angle = true;
                current.push(c);
            }
            '>' if !quoted && comment_depth == 0 => {
                angle = false;
                current.push(c);
            }
            ':' if !quoted && !angle && comment_depth == 0 => {
                // group name: discard what came before
                current.clear();
            }
            ',' | ';' if !quoted && !angle && comment_depth == 0 => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    entries.push(current);

    entries
}

fn parse_entry(entry: &str) -> Option<Address> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }

    let mut text = String::new();
    let mut comments = String::new();
    let mut address = None;

    let mut chars = entry.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => quoted = !quoted,
            '\\' if quoted => {
                if let Some(c) = chars.next() {
                    text.push(c);
                }
            }
            '(' if !quoted => {
                let mut depth = 1;
                for c in chars.by_ref() {
                    match c {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    comments.push(c);
                }
                comments.push(' ');
            }
            '<' if !quoted => {
                let mut addr = String::new();
                for c in chars.by_ref() {
                    if c == '>' {
                        break;
                    }
                    addr.push(c);
                }
                address = Some(addr.trim().to_owned());
            }
            _ => text.push(c),
        }
    }

    let text = collapse_whitespace(&text);
    let comments = collapse_whitespace(&comments);

    let (name, address) = match address {
        Some(address) => {
            let name = if text.is_empty() { comments } else { text };
            (name, address)
        }
        None if text.contains('@') => {
            // bare address, possibly followed by junk
            let mut words = text.split_whitespace();
            let address = words.next().unwrap_or_default().to_owned();
            let rest: Vec<_> = words.collect();
            let name = if rest.is_empty() { comments } else { rest.join(" ") };
            (name, address)
        }
        None => {
            let name = if text.is_empty() { comments } else { text };
            (name, String::new())
        }
    };

    if name.is_empty() && address.is_empty() {
        return None;
    }

    Some(Address {
        name: header::decode_words(&name),
        address,
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converts the domain part of an address to its IDNA A-label form.
pub fn encode_address(address: &str) -> String {
    match address.rsplit_once('@') {
        Some((local, domain)) if !domain.is_ascii() => {
            match idna::domain_to_ascii(domain) {
                Ok(domain) => format!("{local}@{domain}"),
                Err(_) => address.to_owned(),
            }
        }
        _ => address.to_owned(),
    }
}

/// Re-encodes an address list for a header: display names are quoted or
/// converted to encoded words as needed, domains are converted to A-labels.
pub fn encode_address_list(value: &str) -> String {
    let addresses = parse_addresses(value);

    let mut result = String::new();

    for addr in addresses.iter().filter(|a| !a.address.is_empty()) {
        if !result.is_empty() {
            result.push_str(", ");
        }

        let address = encode_address(&addr.address);

        if addr.name.is_empty() {
            result.push_str(&address);
        } else {
            write!(result, "{} <{address}>", encode_phrase(&addr.name)).unwrap();
        }
    }

    result
}

fn encode_phrase(name: &str) -> String {
    if !name.is_ascii() {
        header::encode_word(name)
    } else if name.chars().all(|c| c.is_ascii_alphanumeric() || " !#$%&'*+-/=?^_`{|}~".contains(c)) {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

/// Returns the domain part of an address, if any.
pub fn domain_of(address: &str) -> Option<&str> {
    address.rsplit_once('@').map(|(_, domain)| domain).filter(|d| !d.is_empty())
}
