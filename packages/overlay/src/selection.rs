//! Interaction modes and the hovered/selected element pair

use crate::config::{Marker, OverlayConfig};
use canopy_dom::RenderTree;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Select,
    Drag,
    Text,
    Style,
    Js,
    Add,
}

impl Mode {
    /// Whether an existing selection survives switching into this mode
    pub fn preserves_selection(self) -> bool {
        matches!(self, Mode::Select | Mode::Style | Mode::Js | Mode::Add)
    }

    /// Whether clicks must not trigger the page's own navigation
    pub fn suppresses_click_default(self) -> bool {
        self != Mode::Add
    }

    /// Whether pointer over/out moves the hover marker
    pub fn tracks_hover(self) -> bool {
        self == Mode::Select
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Select => "select",
            Mode::Drag => "drag",
            Mode::Text => "text",
            Mode::Style => "style",
            Mode::Js => "js",
            Mode::Add => "add",
        };
        f.write_str(name)
    }
}

/// At most one hovered and one selected element
#[derive(Debug)]
pub struct SelectionTracker<N> {
    hovered: Option<N>,
    selected: Option<N>,
}

impl<N> Default for SelectionTracker<N> {
    fn default() -> Self {
        Self {
            hovered: None,
            selected: None,
        }
    }
}

impl<N: Clone + PartialEq> SelectionTracker<N> {
    pub fn hovered(&self) -> Option<&N> {
        self.hovered.as_ref()
    }

    pub fn selected(&self) -> Option<&N> {
        self.selected.as_ref()
    }

    /// Hover `node` unless it is already hovered or selected.
    /// Returns whether the hover changed.
    pub fn hover<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, node: &N) -> bool {
        if self.hovered.as_ref() == Some(node) || self.selected.as_ref() == Some(node) {
            return false;
        }
        self.clear_hover(tree, config);
        tree.add_class(node, &config.class(Marker::Hover));
        self.hovered = Some(node.clone());
        true
    }

    /// Drop the hover only when the pointer leaves the hovered element itself
    pub fn unhover<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, node: &N) {
        if self.hovered.as_ref() == Some(node) {
            self.clear_hover(tree, config);
        }
    }

    pub fn clear_hover<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        if let Some(node) = self.hovered.take() {
            tree.remove_class(&node, &config.class(Marker::Hover));
        }
    }

    pub fn select<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, node: &N) {
        self.clear_selection(tree, config);
        self.clear_hover(tree, config);
        tree.add_class(node, &config.class(Marker::Selected));
        self.selected = Some(node.clone());
    }

    pub fn clear_selection<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        if let Some(node) = self.selected.take() {
            tree.remove_class(&node, &config.class(Marker::Selected));
        }
    }
}

/// Put `marker` on `node` only, removing it from every other element
pub fn mark_exclusive<T: RenderTree>(tree: &mut T, config: &OverlayConfig, node: &T::Node, marker: Marker) {
    let class = config.class(marker);
    strip_marker(tree, &class);
    tree.add_class(node, &class);
}

/// Remove a marker class from the whole document
pub fn strip_marker<T: RenderTree>(tree: &mut T, class: &str) {
    for node in tree.descendants(&tree.document_element()) {
        if tree.has_class(&node, class) {
            tree.remove_class(&node, class);
        }
    }
}
