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

use crate::{
    header::{self, HeaderValue, LINE_WIDTH},
    mime::{address, flowed, types},
    quoted_printable, util,
};
use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// Prefix of generated multipart boundaries.
const BOUNDARY_PREFIX: &str = "----viasmime-?=_";

/// Handle of a node in a [`MimeBuilder`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

/// Body content of a node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Content {
    Text(String),
    Binary(Vec<u8>),
}

impl Content {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.into())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&[u8]> for Content {
    fn from(b: &[u8]) -> Self {
        Self::Binary(b.into())
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

/// Options for creating a node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeOptions {
    /// File name of an attachment. When no content type is given, the content
    /// type is derived from the file name extension.
    pub filename: Option<String>,
    /// Shared part of the multipart boundaries of a tree rooted at this node.
    /// Random if not given.
    pub base_boundary: Option<String>,
    /// Whether to emit the `Bcc` header.
    pub include_bcc: bool,
    /// Value of the `Date` header of a root node. The current time if not
    /// given.
    pub date: Option<DateTime<Utc>>,
}

/// Sender and recipients collected from the address headers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Envelope {
    pub from: Option<String>,
    pub to: Vec<String>,
}

#[derive(Clone, Debug)]
struct Node {
    root: NodeId,
    parent: Option<NodeId>,
    // identifier within the tree, used for boundaries
    seq: u64,
    // last identifier handed out, meaningful for roots only
    node_counter: u64,
    base_boundary: String,
    date: DateTime<Utc>,
    filename: Option<String>,
    include_bcc: bool,
    headers: Vec<(String, String)>,
    content: Option<Content>,
    children: Vec<NodeId>,
}

/// An arena of MIME nodes.
///
/// Nodes form trees: each node has a root and an optional parent, and a list
/// of children. A node belongs to exactly one tree at any time. Moving a node
/// into another tree gives it and its descendants fresh identifiers from the
/// new root, so that generated boundaries stay unique within a tree.
///
/// [`NodeId`]s are only meaningful for the builder that created them; passing
/// a foreign handle panics.
///
/// # Examples
///
/// ```
/// use viasmime::mime::{MimeBuilder, NodeOptions};
///
/// let mut builder = MimeBuilder::new();
///
/// let root = builder.create_node(Some("multipart/mixed"), NodeOptions::default());
/// builder.set_header(root, "from", "Alice <alice@example.com>");
///
/// let text = builder.create_child(root, Some("text/plain"), NodeOptions::default());
/// builder.set_content(text, "Hello!");
///
/// let message = builder.build(root);
///
/// assert!(message.contains("From: Alice <alice@example.com>\r\n"));
/// assert!(message.contains("MIME-Version: 1.0\r\n"));
/// assert!(message.contains("\r\n\r\nHello!\r\n"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MimeBuilder {
    nodes: Vec<Node>,
}

impl MimeBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a new node as the root of its own tree.
    pub fn create_node(&mut self, content_type: Option<&str>, options: NodeOptions) -> NodeId {
        let id = NodeId(self.nodes.len());

        let content_type = match (content_type, &options.filename) {
            (Some(ct), _) if !ct.trim().is_empty() => Some(ct.to_owned()),
            (_, Some(filename)) => Some(types::detect_mime_type_for_filename(filename).to_owned()),
            _ => None,
        };

        self.nodes.push(Node {
            root: id,
            parent: None,
            seq: 1,
            node_counter: 1,
            base_boundary: options.base_boundary.unwrap_or_else(generate_base_boundary),
            date: options.date.unwrap_or_else(Utc::now),
            filename: options.filename,
            include_bcc: options.include_bcc,
            headers: vec![],
            content: None,
            children: vec![],
        });

        if let Some(ct) = content_type {
            self.set_header(id, "Content-Type", ct);
        }

        id
    }

    /// Creates a new node and appends it to the given parent.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        content_type: Option<&str>,
        options: NodeOptions,
    ) -> NodeId {
        let child = self.create_node(content_type, options);
        self.append_child(parent, child)
    }

    /// Appends a node as the last child of a parent. The node is first
    /// detached from its previous parent, if any.
    ///
    /// # Panics
    ///
    /// Panics if the child is the parent or one of its ancestors.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> NodeId {
        assert!(
            !self.is_ancestor_or_self(child, parent),
            "cannot append a node to itself or its descendant"
        );

        self.detach(child);

        let new_root = self.nodes[parent.0].root;
        if self.nodes[child.0].root != new_root {
            let subtree = self.subtree(child);
            self.move_to_root(&subtree, new_root);
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);

        child
    }

    /// Puts `new` in the place of `old`. The replacement inherits the root,
    /// parent, position, and identifier of `old`, which becomes the root of
    /// its own tree.
    ///
    /// # Panics
    ///
    /// Panics if `new` is an ancestor of `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> NodeId {
        if old == new {
            return new;
        }

        let Some(parent) = self.nodes[old.0].parent else {
            return new;
        };

        assert!(
            !self.is_ancestor_or_self(new, old),
            "cannot replace a node with its ancestor"
        );

        self.detach(new);

        let root = self.nodes[old.0].root;
        let moved_in = self.nodes[new.0].root != root;

        let position = self.position_in_parent(old, parent);
        self.nodes[parent.0].children[position] = new;

        let seq = self.nodes[old.0].seq;
        let node = &mut self.nodes[new.0];
        node.root = root;
        node.parent = Some(parent);
        node.seq = seq;

        if moved_in {
            let subtree = self.subtree(new);
            self.move_to_root(&subtree[1..], root);
        }

        self.nodes[old.0].parent = None;
        self.make_root(old);

        new
    }

    /// Detaches a node from its parent, making it the root of its own tree.
    pub fn remove(&mut self, node: NodeId) -> NodeId {
        if self.nodes[node.0].parent.is_some() {
            self.detach(node);
            self.make_root(node);
        }
        node
    }

    /// Sets a header, replacing the first existing header with the same
    /// (normalised) key and removing any further ones.
    pub fn set_header(
        &mut self,
        node: NodeId,
        key: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        set_header_in(&mut self.nodes[node.0].headers, key, value.into());
        self
    }

    /// Sets several headers in order, with the same semantics as
    /// [`set_header`][Self::set_header].
    pub fn set_headers<I, K, V>(&mut self, node: NodeId, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.set_header(node, key.as_ref(), value);
        }
        self
    }

    /// Appends a header, keeping existing headers with the same key.
    pub fn add_header(
        &mut self,
        node: NodeId,
        key: &str,
        value: impl Into<String>,
    ) -> &mut Self {
        let key = header::normalize_key(key);
        self.nodes[node.0].headers.push((key, value.into()));
        self
    }

    /// Appends several headers in order.
    pub fn add_headers<I, K, V>(&mut self, node: NodeId, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.add_header(node, key.as_ref(), value);
        }
        self
    }

    /// Returns the value of the first header with the given key.
    pub fn get_header(&self, node: NodeId, key: &str) -> Option<&str> {
        get_header_in(&self.nodes[node.0].headers, key)
    }

    pub fn headers(&self, node: NodeId) -> &[(String, String)] {
        &self.nodes[node.0].headers
    }

    /// Sets the body content. Encoding decisions are made when building.
    pub fn set_content(&mut self, node: NodeId, content: impl Into<Content>) -> &mut Self {
        self.nodes[node.0].content = Some(content.into());
        self
    }

    pub fn content(&self, node: NodeId) -> Option<&Content> {
        self.nodes[node.0].content.as_ref()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn root(&self, node: NodeId) -> NodeId {
        self.nodes[node.0].root
    }

    pub fn filename(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].filename.as_deref()
    }

    /// Returns the boundary a multipart node is built with, or `None` if the
    /// node is not multipart.
    pub fn boundary(&self, node: NodeId) -> Option<String> {
        let content_type = HeaderValue::parse(self.get_header(node, "Content-Type")?);
        if !content_type.mime_type().starts_with("multipart/") {
            return None;
        }
        match content_type.param("boundary") {
            Some(b) if !b.is_empty() => Some(b.to_owned()),
            _ => Some(self.generate_boundary(node)),
        }
    }

    /// Collects the sender (`From`, else the first of `Reply-To` and `Sender`)
    /// and all recipients (`To`, `Cc`, `Bcc`) of a node.
    pub fn envelope(&self, node: NodeId) -> Envelope {
        let mut envelope = Envelope::default();

        for (key, value) in &self.nodes[node.0].headers {
            match key.as_str() {
                "From" | "Reply-To" | "Sender" => {
                    if key == "From" || envelope.from.is_none() {
                        let first = address::parse_addresses(value)
                            .into_iter()
                            .find(|a| !a.address.is_empty());
                        if let Some(first) = first {
                            envelope.from = Some(first.address);
                        }
                    }
                }
                "To" | "Cc" | "Bcc" => {
                    envelope.to.extend(
                        address::parse_addresses(value)
                            .into_iter()
                            .filter(|a| !a.address.is_empty())
                            .map(|a| a.address),
                    );
                }
                _ => {}
            }
        }

        envelope
    }

    /// Serialises a node and its descendants to wire format with CRLF line
    /// endings. Root nodes receive `Date`, `Message-ID`, and `MIME-Version`
    /// headers if these are missing.
    pub fn build(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];

        let mut headers = node.headers.clone();

        let content_type = get_header_in(&headers, "Content-Type")
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let multipart = content_type.starts_with("multipart/");

        let content = node.content.as_ref().filter(|c| !c.is_empty());

        let mut flowed = false;
        let mut transfer_encoding = None;

        if let Some(content) = content {
            let current = get_header_in(&headers, "Content-Transfer-Encoding")
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();

            transfer_encoding = if matches!(current.as_str(), "base64" | "quoted-printable") {
                Some(current)
            } else if content_type.starts_with("text/") {
                match content {
                    Content::Text(text) if is_plain_text(text) => {
                        flowed = has_long_lines(text);
                        Some("7bit".into())
                    }
                    _ => Some("quoted-printable".into()),
                }
            } else if !multipart {
                Some(if current.is_empty() { "base64".into() } else { current })
            } else {
                None
            };

            if let Some(te) = &transfer_encoding {
                set_header_in(&mut headers, "Content-Transfer-Encoding", te.clone());
            }
        }

        if multipart {
            headers.retain(|(k, _)| k != "Content-Transfer-Encoding");
        }

        if node.filename.is_some() && get_header_in(&headers, "Content-Disposition").is_none() {
            set_header_in(&mut headers, "Content-Disposition", "attachment".into());
        }

        let mut lines = vec![];
        let mut boundary = None;

        for (key, value) in &headers {
            let value = match key.as_str() {
                "Content-Disposition" => {
                    let mut structured = HeaderValue::parse(value);
                    if let Some(filename) = &node.filename {
                        structured.set_param("filename", filename.as_str());
                    }
                    structured.build()
                }
                "Content-Type" => {
                    let mut structured = HeaderValue::parse(value);

                    if structured.mime_type().starts_with("multipart/") {
                        let b = match structured.param("boundary") {
                            Some(b) if !b.is_empty() => b.to_owned(),
                            _ => self.generate_boundary(id),
                        };
                        structured.set_param("boundary", b.as_str());
                        boundary = Some(b);
                    }

                    if flowed {
                        structured.set_param("format", "flowed");
                    }
                    if structured
                        .param("format")
                        .map_or(false, |f| f.trim().eq_ignore_ascii_case("flowed"))
                    {
                        flowed = true;
                    }

                    if structured.mime_type().starts_with("text/")
                        && matches!(content, Some(Content::Text(text)) if !text.is_ascii())
                    {
                        structured.set_param("charset", "utf-8");
                    }

                    structured.build()
                }
                "Bcc" if !node.include_bcc => continue,
                _ => value.clone(),
            };

            let value = header::encode_header_value(key, &value);
            if value.trim().is_empty() {
                continue;
            }

            lines.push(header::fold_line(&format!("{key}: {value}"), LINE_WIDTH));
        }

        if node.root == id {
            if get_header_in(&headers, "Date").is_none() {
                lines.push(format!("Date: {}", node.date.format("%a, %d %b %Y %H:%M:%S +0000")));
            }
            if get_header_in(&headers, "Message-ID").is_none() {
                lines.push(format!("Message-ID: {}", self.generate_message_id(id)));
            }
            if get_header_in(&headers, "MIME-Version").is_none() {
                lines.push("MIME-Version: 1.0".into());
            }
        }

        lines.push(String::new());

        if let Some(content) = content {
            let body = match transfer_encoding.as_deref() {
                Some("quoted-printable") => quoted_printable::encode(content.as_bytes()),
                Some("base64") => util::encode_base64_lines(content.as_bytes()),
                _ => {
                    let text = String::from_utf8_lossy(content.as_bytes());
                    if flowed {
                        flowed::encode(&text)
                    } else {
                        text.replace("\r\n", "\n").replace('\n', "\r\n")
                    }
                }
            };
            lines.push(body);

            if multipart {
                lines.push(String::new());
            }
        }

        if let (true, Some(boundary)) = (multipart, boundary) {
            for &child in &node.children {
                lines.push(format!("--{boundary}"));
                lines.push(self.build(child));
            }
            lines.push(format!("--{boundary}--"));
            lines.push(String::new());
        }

        lines.join("\r\n")
    }

    fn generate_boundary(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        let root = &self.nodes[node.root.0];
        format!("{BOUNDARY_PREFIX}{}-{}", node.seq, root.base_boundary)
    }

    fn generate_message_id(&self, id: NodeId) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());

        let from = self.envelope(id).from.map(|a| address::encode_address(&a));
        let domain = from
            .as_deref()
            .and_then(address::domain_of)
            .unwrap_or("localhost");

        format!(
            "<{millis}-{:08x}-{:08x}-{:08x}@{domain}>",
            rand::random::<u32>(),
            rand::random::<u32>(),
            rand::random::<u32>(),
        )
    }

    fn next_seq(&mut self, root: NodeId) -> u64 {
        let root = &mut self.nodes[root.0];
        root.node_counter += 1;
        root.node_counter
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            let position = self.position_in_parent(node, parent);
            self.nodes[parent.0].children.remove(position);
        }
    }

    fn position_in_parent(&self, node: NodeId, parent: NodeId) -> usize {
        self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == node)
            .unwrap_or_else(|| unreachable!("child missing from parent"))
    }

    fn make_root(&mut self, node: NodeId) {
        let n = &mut self.nodes[node.0];
        n.root = node;
        n.node_counter = n.node_counter.max(n.seq);

        let subtree = self.subtree(node);
        self.move_to_root(&subtree[1..], node);
    }

    fn move_to_root(&mut self, nodes: &[NodeId], root: NodeId) {
        for &node in nodes {
            let seq = self.next_seq(root);
            let n = &mut self.nodes[node.0];
            n.root = root;
            n.seq = seq;
        }
        trace!(count = nodes.len(), "moved MIME nodes to new root");
    }

    // pre-order, including the node itself
    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = vec![];
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            result.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev());
        }
        result
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == candidate {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }
}

fn set_header_in(headers: &mut Vec<(String, String)>, key: &str, value: String) {
    let key = header::normalize_key(key);

    let mut value = Some(value);
    headers.retain_mut(|(k, v)| {
        if *k != key {
            return true;
        }
        match value.take() {
            Some(new) => {
                *v = new;
                true
            }
            None => false,
        }
    });

    if let Some(value) = value {
        headers.push((key, value));
    }
}

fn get_header_in<'a>(headers: &'a [(String, String)], key: &str) -> Option<&'a str> {
    let key = header::normalize_key(key);
    headers
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.as_str())
}

// no control characters other than tab and line breaks, ASCII only
fn is_plain_text(text: &str) -> bool {
    !text.chars().any(|c| {
        matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}') || !c.is_ascii()
    })
}

fn has_long_lines(text: &str) -> bool {
    text.split(|c| c == '\r' || c == '\n').any(|line| line.chars().count() > LINE_WIDTH)
}

fn generate_base_boundary() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("{millis}{:016x}", rand::random::<u64>())
}
