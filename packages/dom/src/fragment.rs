//! Markup-fragment parsing.
//!
//! Fragments go through html5ever's fragment algorithm with a `<template>`
//! context, the same path the browser binding takes when it assigns
//! `innerHTML` on a template element. Implied end tags, raw-text elements
//! and foster parenting therefore behave as they do on a live page.

use crate::error::{DomError, DomResult};
use html5ever::tendril::TendrilSink;
use html5ever::{ns, parse_fragment as parse_html_fragment, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text children serialize without escaping
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<FragmentNode>,
    },
    Text(String),
}

impl FragmentNode {
    pub fn is_element(&self) -> bool {
        matches!(self, FragmentNode::Element { .. })
    }
}

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(&tag)
}

pub fn is_raw_text_tag(tag: &str) -> bool {
    RAW_TEXT_TAGS.contains(&tag)
}

/// Parse a markup fragment into top-level nodes
pub fn parse_fragment(markup: &str) -> DomResult<Vec<FragmentNode>> {
    let context = QualName::new(None, ns!(html), "template".into());
    let dom = parse_html_fragment(RcDom::default(), ParseOpts::default(), context, vec![], false)
        .from_utf8()
        .read_from(&mut markup.as_bytes())
        .map_err(|e| DomError::Platform(e.to_string()))?;

    // The fragment algorithm parents everything under a synthetic <html> root
    let document = dom.document.children.borrow();
    let roots: Vec<Handle> = match document.first() {
        Some(root) if is_element_named(root, "html") => root.children.borrow().clone(),
        _ => document.clone(),
    };
    Ok(roots.iter().filter_map(convert).collect())
}

fn is_element_named(handle: &Handle, tag: &str) -> bool {
    matches!(&handle.data, NodeData::Element { name, .. } if &*name.local == tag)
}

fn convert(handle: &Handle) -> Option<FragmentNode> {
    match &handle.data {
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let attributes = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();

            // Template children live in a separate content fragment
            let contents = template_contents.borrow();
            let source = contents.as_ref().unwrap_or(handle);
            let children = source.children.borrow().iter().filter_map(convert).collect();

            Some(FragmentNode::Element {
                tag: name.local.to_string(),
                attributes,
                children,
            })
        }
        NodeData::Text { contents } => Some(FragmentNode::Text(contents.borrow().to_string())),
        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => None,
    }
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
