//! MusicXML parser: converts MusicXML text into the owned Score tree.

use roxmltree::{Document, Node};

use crate::error::{Result, SplitError};
use crate::model::*;

/// Parse a MusicXML XML string into a Score.
pub fn parse_musicxml(xml: &str) -> Result<Score> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| SplitError::Parse(format!("XML parse error: {e}")))?;
    let root = doc.root_element();

    // Verify this is a score-partwise document
    if root.tag_name().name() != "score-partwise" {
        return Err(SplitError::Parse(format!(
            "Unsupported root element: '{}'. Only 'score-partwise' is supported.",
            root.tag_name().name()
        )));
    }

    let mut score = Score::new();
    score.root = Element {
        name: qualified_name(&root),
        attributes: collect_attributes(&root),
        children: Vec::new(),
    };

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "part" => score.parts.push(parse_part(&child)),
            _ => score.metadata.push(convert(&child)),
        }
    }

    Ok(score)
}

// ─── Part (measures) ─────────────────────────────────────────────────

fn parse_part(node: &Node) -> Part {
    let id = node.attribute("id").unwrap_or("").to_string();
    let measures = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "measure")
        .map(|m| Measure::from_element(convert(&m)))
        .collect();

    Part { id, measures }
}

// ─── Tree conversion ─────────────────────────────────────────────────

fn convert(node: &Node) -> Element {
    let mut element = Element {
        name: qualified_name(node),
        attributes: collect_attributes(node),
        children: Vec::new(),
    };

    for child in node.children() {
        if child.is_element() {
            element.push(convert(&child));
        } else if let Some(text) = child.text().filter(|_| child.is_text()) {
            // Indentation between elements is regenerated on write
            if !text.trim().is_empty() {
                element.children.push(XmlNode::Text(text.to_string()));
            }
        }
    }

    element
}

/// Attributes plus any namespace declarations introduced on this element.
fn collect_attributes(node: &Node) -> Vec<(String, String)> {
    let inherited: Vec<_> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();

    let declared = node
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| match ns.name() {
            Some(prefix) => (format!("xmlns:{prefix}"), ns.uri().to_string()),
            None => ("xmlns".to_string(), ns.uri().to_string()),
        });

    let plain = node.attributes().map(|a| {
        let name = match a.namespace().and_then(|uri| node.lookup_prefix(uri)) {
            Some(prefix) => format!("{prefix}:{}", a.name()),
            None => a.name().to_string(),
        };
        (name, a.value().to_string())
    });

    declared.chain(plain).collect()
}

fn qualified_name(node: &Node) -> String {
    let tag = node.tag_name();
    match tag.namespace().and_then(|uri| node.lookup_prefix(uri)) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{}", tag.name()),
        _ => tag.name().to_string(),
    }
}
