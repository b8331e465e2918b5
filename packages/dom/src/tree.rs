use crate::error::DomResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Half-open containment: the right and bottom edges belong to the next box
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left() && x < self.right() && y >= self.top() && y < self.bottom()
    }
}

/// A live, mutable render tree.
///
/// Handles are cheap to clone and compare by identity. Only element nodes are
/// ever handed out; text nodes are reachable through the text accessors.
pub trait RenderTree {
    type Node: Clone + PartialEq + fmt::Debug;

    /// The `<html>` element
    fn document_element(&self) -> Self::Node;

    fn body(&self) -> Option<Self::Node>;

    /// Lowercase tag name
    fn tag_name(&self, node: &Self::Node) -> String;

    /// Parent element, `None` for detached nodes and the document element
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Element children in document order
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Next element sibling
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Every element below `node` in document order, excluding `node`
    fn descendants(&self, node: &Self::Node) -> Vec<Self::Node>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    fn classes(&self, node: &Self::Node) -> Vec<String>;

    fn add_class(&mut self, node: &Self::Node, class: &str);

    fn remove_class(&mut self, node: &Self::Node, class: &str);

    /// Concatenated text of the whole subtree
    fn text_content(&self, node: &Self::Node) -> String;

    /// Replace the subtree with a single text node
    fn set_text_content(&mut self, node: &Self::Node, text: &str);

    /// First direct text child containing non-whitespace, untrimmed
    fn own_text(&self, node: &Self::Node) -> Option<String>;

    /// Insert `child` under `parent` before `reference` (append when `None`).
    /// Attached nodes are moved. Fails if `child` is an inclusive ancestor of
    /// `parent` or `reference` is not a child of `parent`.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> DomResult<()>;

    fn replace_child(
        &mut self,
        parent: &Self::Node,
        new_child: &Self::Node,
        old_child: &Self::Node,
    ) -> DomResult<()>;

    /// Remove `node` from its parent; a no-op for detached nodes
    fn detach(&mut self, node: &Self::Node);

    /// Detached deep copy of `node`
    fn deep_clone(&mut self, node: &Self::Node) -> Self::Node;

    /// Parse markup into detached nodes, returning the top-level elements
    fn parse_fragment(&mut self, markup: &str) -> DomResult<Vec<Self::Node>>;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn bounding_rect(&self, node: &Self::Node) -> Rect;

    /// Hit-test: every element under the point, topmost first
    fn elements_at_point(&self, x: f64, y: f64) -> Vec<Self::Node>;

    /// Inline style declaration
    fn style_property(&self, node: &Self::Node, property: &str) -> Option<String>;

    /// Set an inline style declaration; an empty value removes it
    fn set_style_property(&mut self, node: &Self::Node, property: &str, value: &str);

    fn computed_style(&self, node: &Self::Node, property: &str) -> Option<String> {
        self.style_property(node, property)
    }

    fn query_selector_all(&self, selector: &str) -> DomResult<Vec<Self::Node>>;

    fn scroll_into_view(&mut self, _node: &Self::Node) {}

    /// Page scroll position `(left, top)`
    fn scroll_offset(&self) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn has_attribute(&self, node: &Self::Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Inclusive: a node contains itself
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if &n == ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    /// Nearest inclusive ancestor carrying `name`
    fn closest_with_attribute(&self, node: &Self::Node, name: &str) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if self.has_attribute(&n, name) {
                return Some(n);
            }
            current = self.parent(&n);
        }
        None
    }

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node> {
        self.children(node).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges_are_half_open() {
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert!(rect.contains(10.0, 20.0));
        assert!(rect.contains(109.9, 69.9));
        assert!(!rect.contains(110.0, 40.0));
        assert!(!rect.contains(50.0, 70.0));
        assert_eq!(rect.bottom(), 70.0);
    }
}
