//! Parsed-document edits and re-serialization.
//!
//! Rules never mutate the parsed tree. They record [`Edits`] keyed by
//! [`NodeId`], and [`serialize`] walks the untouched tree once, applying the
//! edits as it writes markup. Text and attribute values are re-escaped on the
//! way out, so a rule can never turn parsed text back into live markup.
//! Raw-text and void handling apply to HTML-namespace elements only: a
//! `<style>` inside `<svg>` or `<math>` holds ordinary escaped text.
//! Attributes are written in name order so output does not depend on the
//! parser's attribute storage.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use html5ever::{local_name, namespace_url, ns, QualName};
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// HTML5 void elements that must not have a closing tag. HTML namespace only.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted without escaping. HTML
/// namespace only.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Pending changes to a parsed document.
#[derive(Debug, Default)]
pub struct Edits {
    removed: HashSet<NodeId>,
    removed_attrs: HashMap<NodeId, Vec<String>>,
    set_attrs: HashMap<NodeId, Vec<(String, String)>>,
    prepended: HashMap<NodeId, String>,
    appended: HashMap<NodeId, String>,
    doctype: bool,
}

impl Edits {
    /// Drop a node and its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        self.removed.insert(node);
    }

    /// Drop one attribute from an element.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        self.removed_attrs.entry(node).or_default().push(name.to_owned());
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let attrs = self.set_attrs.entry(node).or_default();
        attrs.retain(|(existing, _)| existing != name);
        attrs.push((name.to_owned(), value.to_owned()));
    }

    /// Insert trusted markup as the first children of a node.
    pub fn prepend_html(&mut self, node: NodeId, markup: &str) {
        self.prepended.entry(node).or_default().push_str(markup);
    }

    /// Insert trusted markup as the last children of a node.
    pub fn append_html(&mut self, node: NodeId, markup: &str) {
        self.appended.entry(node).or_default().push_str(markup);
    }

    /// Emit `<!DOCTYPE html>` ahead of the document.
    pub fn prepend_doctype(&mut self) {
        self.doctype = true;
    }

    pub fn is_empty(&self) -> bool {
        !self.doctype
            && self.removed.is_empty()
            && self.removed_attrs.is_empty()
            && self.set_attrs.is_empty()
            && self.prepended.is_empty()
            && self.appended.is_empty()
    }

    /// Number of recorded edits.
    pub fn len(&self) -> usize {
        usize::from(self.doctype)
            + self.removed.len()
            + self.removed_attrs.values().map(Vec::len).sum::<usize>()
            + self.set_attrs.values().map(Vec::len).sum::<usize>()
            + self.prepended.len()
            + self.appended.len()
    }
}

/// Iterate the elements named `tag`, in document order.
pub fn elements<'a>(html: &'a Html, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    all_elements(html).filter(move |el| el.value().name() == tag)
}

/// Iterate every element, in document order.
pub fn all_elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> + '_ {
    html.tree.root().descendants().filter_map(ElementRef::wrap)
}

pub fn has_doctype(html: &Html) -> bool {
    html.tree
        .root()
        .children()
        .any(|node| matches!(node.value(), Node::Doctype(_)))
}

/// Serialize the document with `edits` applied.
pub fn serialize(html: &Html, edits: &Edits) -> String {
    let mut out = String::new();
    if edits.doctype {
        out.push_str("<!DOCTYPE html>");
    }
    serialize_node(html.tree.root(), edits, false, &mut out);
    out
}

fn serialize_node(node: NodeRef<Node>, edits: &Edits, raw_text: bool, out: &mut String) {
    let id = node.id();
    if edits.removed.contains(&id) {
        return;
    }

    match node.value() {
        Node::Document | Node::Fragment => {
            serialize_children(node, edits, false, out);
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            out.push('>');
        }
        Node::Element(el) => {
            let tag = el.name();
            let html_ns = el.name.ns == ns!(html);
            out.push('<');
            out.push_str(tag);

            let removed = edits.removed_attrs.get(&id);
            let overrides = edits.set_attrs.get(&id);
            let mut attrs: Vec<(Cow<'_, str>, &str)> = el
                .attrs
                .iter()
                .map(|(name, value)| (qualified_attr_name(name), &**value))
                .collect();
            attrs.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (name, value) in &attrs {
                let name: &str = name;
                if removed.is_some_and(|names| names.iter().any(|n| n == name)) {
                    continue;
                }
                let value = overrides
                    .and_then(|pending| pending.iter().find(|(n, _)| n == name))
                    .map_or(*value, |(_, v)| v.as_str());
                push_attr(out, name, value);
            }
            for (name, value) in overrides.into_iter().flatten() {
                if !attrs.iter().any(|(existing, _)| existing == name) {
                    push_attr(out, name, value);
                }
            }
            out.push('>');

            if html_ns && VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw_text = html_ns && RAW_TEXT_ELEMENTS.contains(&tag);
            serialize_children(node, edits, raw_text, out);

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                escape_text(out, text);
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        _ => {}
    }
}

fn serialize_children(node: NodeRef<Node>, edits: &Edits, raw_text: bool, out: &mut String) {
    let id = node.id();
    if let Some(markup) = edits.prepended.get(&id) {
        out.push_str(markup);
    }
    for child in node.children() {
        serialize_node(child, edits, raw_text, out);
    }
    if let Some(markup) = edits.appended.get(&id) {
        out.push_str(markup);
    }
}

/// Attribute name as written in markup, with the prefix of the foreign
/// attributes the HTML parser namespaces (`xlink:href`, `xml:lang`, ...).
fn qualified_attr_name(name: &QualName) -> Cow<'_, str> {
    let prefix = match name.ns {
        ns!() => None,
        ns!(xml) => Some("xml"),
        ns!(xmlns) if name.local == local_name!("xmlns") => None,
        ns!(xmlns) => Some("xmlns"),
        ns!(xlink) => Some("xlink"),
        _ => name.prefix.as_deref(),
    };
    match prefix {
        Some(prefix) => Cow::Owned(format!("{prefix}:{}", name.local)),
        None => Cow::Borrowed(&*name.local),
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

/// Escape a value for use inside a double-quoted attribute.
pub fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}
