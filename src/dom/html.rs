//! HTML loading (through `scraper`) and serialization for [`Document`].

use super::{Document, NodeId, NodeKind};
use scraper::{ElementRef, Html};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text children are written out verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Parse a full HTML page. The parser is error tolerant, so this never fails;
/// missing `<html>`/`<body>` wrappers are synthesized.
pub fn parse_document(source: &str) -> Document {
    let html = Html::parse_document(source);
    let mut doc = Document::new();
    let root = doc.root();
    copy_element(&mut doc, root, html.root_element());
    // 載入本身不算頁面變動
    doc.take_mutations();
    tracing::debug!("Parsed HTML into {} nodes", doc.len());
    doc
}

/// Parse a fragment and append its nodes under `parent`, recording the
/// insertions in the mutation log. Returns the top-level inserted nodes.
pub fn append_fragment(doc: &mut Document, parent: NodeId, source: &str) -> Vec<NodeId> {
    let fragment = Html::parse_fragment(source);
    let mut staging = Document::new();
    let staging_root = staging.root();
    copy_element(&mut staging, staging_root, fragment.root_element());

    // parse_fragment 會包一層 <html>
    let mut top = staging.children(staging_root).to_vec();
    if let [only] = top.as_slice() {
        if staging.tag(*only) == Some("html") {
            top = staging.children(*only).to_vec();
        }
    }

    let mut inserted = Vec::new();
    for node in top {
        let id = import(doc, &staging, node);
        if doc.append_child(parent, id).is_ok() {
            inserted.push(id);
        }
    }
    inserted
}

fn import(doc: &mut Document, from: &Document, node: NodeId) -> NodeId {
    let id = match from.kind(node) {
        Some(NodeKind::Element(data)) => {
            let id = doc.create_element(&data.tag);
            for (name, value) in &data.attrs {
                let _ = doc.set_attr(id, name, value);
            }
            id
        }
        Some(NodeKind::Text(text)) => doc.create_text(text),
        Some(NodeKind::Comment(text)) => doc.create_comment(text),
        _ => doc.create_element("div"),
    };
    for child in from.children(node) {
        let child_id = import(doc, from, *child);
        let _ = doc.append_child(id, child_id);
    }
    id
}

fn copy_element(doc: &mut Document, parent: NodeId, source: ElementRef<'_>) {
    let element = source.value();
    let id = doc.create_element(element.name());
    for (name, value) in element.attrs() {
        let _ = doc.set_attr(id, name, value);
    }
    let _ = doc.append_child(parent, id);

    for child in source.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            copy_element(doc, id, child_element);
        } else if let Some(text) = child.value().as_text() {
            let text_id = doc.create_text(&text[..]);
            let _ = doc.append_child(id, text_id);
        } else if let Some(comment) = child.value().as_comment() {
            let comment_id = doc.create_comment(&comment[..]);
            let _ = doc.append_child(id, comment_id);
        }
    }
}

pub fn serialize(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.kind(node) {
        Some(NodeKind::Root) => {
            out.push_str("<!DOCTYPE html>");
            for child in doc.children(node) {
                write_node(doc, *child, out);
            }
        }
        Some(NodeKind::Text(text)) => {
            let raw = doc
                .parent(node)
                .and_then(|p| doc.tag(p))
                .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        Some(NodeKind::Comment(text)) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Some(NodeKind::Element(data)) => {
            out.push('<');
            out.push_str(&data.tag);
            for (name, value) in &data.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&data.tag.as_str()) {
                return;
            }
            for child in doc.children(node) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(&data.tag);
            out.push('>');
        }
        None => {}
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
