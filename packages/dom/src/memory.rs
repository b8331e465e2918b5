//! Arena-backed DOM for headless use.
//!
//! Nodes are never freed; detached subtrees simply become unreachable from
//! the document element. Layout is not computed: boxes are assigned with
//! [`MemoryDom::set_rect`] and hit-testing uses them directly.

use crate::error::{DomError, DomResult};
use crate::fragment::{escape_attribute, escape_text, is_raw_text_tag, is_void_tag, parse_fragment, FragmentNode};
use crate::selector::SelectorList;
use crate::tree::{Rect, RenderTree};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeSlot {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Option<Rect>,
}

#[derive(Debug, Clone)]
pub struct MemoryDom {
    slots: Vec<NodeSlot>,
    document: NodeId,
    head: NodeId,
    body: NodeId,
    scroll: (f64, f64),
}

impl MemoryDom {
    /// An empty `<html><head></head><body></body></html>` document
    pub fn new() -> Self {
        let mut dom = Self {
            slots: Vec::new(),
            document: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            scroll: (0.0, 0.0),
        };
        dom.document = dom.alloc_element("html", Vec::new());
        dom.head = dom.alloc_element("head", Vec::new());
        dom.body = dom.alloc_element("body", Vec::new());
        dom.link(dom.document, dom.head);
        dom.link(dom.document, dom.body);
        dom
    }

    /// A document whose body holds `markup`
    pub fn from_markup(markup: &str) -> DomResult<Self> {
        let mut dom = Self::new();
        let nodes = parse_fragment(markup)?;
        let body = dom.body;
        for node in &nodes {
            let id = dom.materialize(node);
            dom.link(body, id);
        }
        Ok(dom)
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.slots[node.0].rect = Some(rect);
    }

    pub fn set_scroll_offset(&mut self, left: f64, top: f64) {
        self.scroll = (left, top);
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(&self.document, &node)
    }

    /// First match of `selector` in document order
    pub fn query_selector(&self, selector: &str) -> DomResult<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in &self.slots[node.0].children {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.slots[node.0].kind {
            NodeKind::Text(text) => {
                let raw = self.slots[node.0]
                    .parent
                    .map(|p| is_raw_text_tag(&self.tag_name(&p)))
                    .unwrap_or(false);
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(tag) {
                    return;
                }
                for child in &self.slots[node.0].children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(NodeSlot {
            kind,
            parent: None,
            children: Vec::new(),
            rect: None,
        });
        id
    }

    fn alloc_element(&mut self, tag: &str, attributes: Vec<(String, String)>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes,
        })
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.slots[child.0].parent = Some(parent);
        self.slots[parent.0].children.push(child);
    }

    fn materialize(&mut self, node: &FragmentNode) -> NodeId {
        match node {
            FragmentNode::Text(text) => self.alloc(NodeKind::Text(text.clone())),
            FragmentNode::Element {
                tag,
                attributes,
                children,
            } => {
                let id = self.alloc_element(tag, attributes.clone());
                for child in children {
                    let child_id = self.materialize(child);
                    self.link(id, child_id);
                }
                id
            }
        }
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(self.slots[node.0].kind, NodeKind::Element { .. })
    }

    fn attributes(&self, node: NodeId) -> Option<&Vec<(String, String)>> {
        match &self.slots[node.0].kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            NodeKind::Text(_) => None,
        }
    }

    fn attributes_mut(&mut self, node: NodeId) -> Option<&mut Vec<(String, String)>> {
        match &mut self.slots[node.0].kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            NodeKind::Text(_) => None,
        }
    }

    fn unlink(&mut self, node: NodeId) {
        if let Some(parent) = self.slots[node.0].parent.take() {
            self.slots[parent.0].children.retain(|c| *c != node);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.slots[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &self.slots[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    fn collect_elements(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.slots[node.0].children {
            if self.is_element(*child) {
                out.push(*child);
                self.collect_elements(*child, out);
            }
        }
    }

    fn clone_subtree(&mut self, node: NodeId) -> NodeId {
        let kind = self.slots[node.0].kind.clone();
        let children = self.slots[node.0].children.clone();
        let id = self.alloc(kind);
        for child in children {
            let child_id = self.clone_subtree(child);
            self.link(id, child_id);
        }
        id
    }

    fn style_declarations(&self, node: NodeId) -> Vec<(String, String)> {
        self.attribute(&node, "style")
            .map(|style| parse_style_declarations(&style))
            .unwrap_or_default()
    }

    fn is_hidden(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.style_property(&n, "display").as_deref() == Some("none") {
                return true;
            }
            current = self.slots[n.0].parent;
        }
        false
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_style_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() {
                None
            } else {
                Some((name.to_ascii_lowercase(), value.to_string()))
            }
        })
        .collect()
}

fn serialize_style_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

impl RenderTree for MemoryDom {
    type Node = NodeId;

    fn document_element(&self) -> NodeId {
        self.document
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn tag_name(&self, node: &NodeId) -> String {
        match &self.slots[node.0].kind {
            NodeKind::Element { tag, .. } => tag.clone(),
            NodeKind::Text(_) => "#text".to_string(),
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.slots[node.0].parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.slots[node.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.slots[node.0].parent?;
        let siblings = &self.slots[parent.0].children;
        let pos = siblings.iter().position(|c| c == node)?;
        siblings[pos + 1..].iter().copied().find(|c| self.is_element(*c))
    }

    fn descendants(&self, node: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements(*node, &mut out);
        out
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attributes(*node)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if let Some(attributes) = self.attributes_mut(*node) {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if let Some(attributes) = self.attributes_mut(*node) {
            attributes.retain(|(n, _)| n != name);
        }
    }

    fn classes(&self, node: &NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn add_class(&mut self, node: &NodeId, class: &str) {
        let mut classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) {
        let classes = self.classes(node);
        if classes.iter().any(|c| c == class) {
            let remaining: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
            self.set_attribute(node, "class", &remaining.join(" "));
        }
    }

    fn text_content(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.collect_text(*node, &mut out);
        out
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) {
        let children = std::mem::take(&mut self.slots[node.0].children);
        for child in children {
            self.slots[child.0].parent = None;
        }
        if !text.is_empty() {
            let text_node = self.alloc(NodeKind::Text(text.to_string()));
            self.link(*node, text_node);
        }
    }

    fn own_text(&self, node: &NodeId) -> Option<String> {
        self.slots[node.0]
            .children
            .iter()
            .find_map(|child| match &self.slots[child.0].kind {
                NodeKind::Text(text) if !text.trim().is_empty() => Some(text.clone()),
                _ => None,
            })
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        reference: Option<&NodeId>,
    ) -> DomResult<()> {
        if !self.is_element(*parent) {
            debug!(parent = parent.0, "insert_before rejected: parent is not an element");
            return Err(DomError::NotAnElement);
        }
        if self.contains(child, parent) {
            debug!(parent = parent.0, child = child.0, "insert_before rejected: would create a cycle");
            return Err(DomError::hierarchy("the new child is an ancestor of the parent"));
        }
        let mut reference = reference.copied();
        if let Some(r) = reference {
            if self.slots[r.0].parent != Some(*parent) {
                debug!(parent = parent.0, reference = r.0, "insert_before rejected: foreign reference node");
                return Err(DomError::hierarchy("the reference node is not a child of the parent"));
            }
            if r == *child {
                // Inserting a node before itself: anchor on whatever follows it
                let siblings = &self.slots[parent.0].children;
                reference = siblings
                    .iter()
                    .position(|c| c == child)
                    .and_then(|pos| siblings.get(pos + 1).copied());
            }
        }

        self.unlink(*child);
        let position = match reference {
            Some(r) => self.slots[parent.0]
                .children
                .iter()
                .position(|c| *c == r)
                .unwrap_or(self.slots[parent.0].children.len()),
            None => self.slots[parent.0].children.len(),
        };
        self.slots[parent.0].children.insert(position, *child);
        self.slots[child.0].parent = Some(*parent);
        Ok(())
    }

    fn replace_child(&mut self, parent: &NodeId, new_child: &NodeId, old_child: &NodeId) -> DomResult<()> {
        if self.slots[old_child.0].parent != Some(*parent) {
            debug!(parent = parent.0, old = old_child.0, "replace_child rejected: foreign old child");
            return Err(DomError::hierarchy("the node to be replaced is not a child of the parent"));
        }
        if new_child == old_child {
            return Ok(());
        }
        if self.contains(new_child, parent) {
            debug!(parent = parent.0, new = new_child.0, "replace_child rejected: would create a cycle");
            return Err(DomError::hierarchy("the new child is an ancestor of the parent"));
        }
        self.unlink(*new_child);
        let position = self.slots[parent.0]
            .children
            .iter()
            .position(|c| c == old_child)
            .ok_or_else(|| DomError::hierarchy("the node to be replaced is not a child of the parent"))?;
        self.slots[parent.0].children[position] = *new_child;
        self.slots[new_child.0].parent = Some(*parent);
        self.slots[old_child.0].parent = None;
        Ok(())
    }

    fn detach(&mut self, node: &NodeId) {
        self.unlink(*node);
    }

    fn deep_clone(&mut self, node: &NodeId) -> NodeId {
        self.clone_subtree(*node)
    }

    fn parse_fragment(&mut self, markup: &str) -> DomResult<Vec<NodeId>> {
        let nodes = parse_fragment(markup)?;
        Ok(nodes
            .iter()
            .filter(|n| n.is_element())
            .map(|n| self.materialize(n))
            .collect())
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc_element(tag, Vec::new())
    }

    fn bounding_rect(&self, node: &NodeId) -> Rect {
        self.slots[node.0].rect.unwrap_or_default()
    }

    fn elements_at_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        let mut hits: Vec<NodeId> = self
            .descendants(&self.document)
            .into_iter()
            .filter(|n| {
                self.slots[n.0].rect.map(|r| r.contains(x, y)).unwrap_or(false)
                    && self.style_property(n, "pointer-events").as_deref() != Some("none")
                    && !self.is_hidden(*n)
            })
            .collect();
        // Later in document order paints on top
        hits.reverse();
        hits
    }

    fn style_property(&self, node: &NodeId, property: &str) -> Option<String> {
        self.style_declarations(*node)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    fn set_style_property(&mut self, node: &NodeId, property: &str, value: &str) {
        let mut declarations = self.style_declarations(*node);
        declarations.retain(|(name, _)| name != property);
        if !value.is_empty() {
            declarations.push((property.to_string(), value.to_string()));
        }
        if declarations.is_empty() {
            self.remove_attribute(node, "style");
        } else {
            self.set_attribute(node, "style", &serialize_style_declarations(&declarations));
        }
    }

    fn query_selector_all(&self, selector: &str) -> DomResult<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .descendants(&self.document)
            .into_iter()
            .filter(|n| list.matches(self, n))
            .collect())
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }
}
