//! # Node Registry
//!
//! Live queries over the render tree for elements tagged with a structure id
//! and an address. Nothing here caches node handles: every call re-reads the
//! tree, so a stale address shows up as a miss rather than a dangling handle.

use crate::config::{AttributeNames, OverlayConfig};
use crate::path::NodePath;
use canopy_dom::RenderTree;

/// Tags the overlay never selects, drags or highlights
pub const IGNORED_TAGS: &[&str] = &[
    "script", "style", "meta", "link", "noscript", "br", "hr", "html", "head",
];

/// Snapshot of one tagged element
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<N> {
    pub node: N,
    /// Own or inherited structure id
    pub structure: Option<String>,
    pub path: NodePath,
    /// Component-scoped alias address
    pub alias: Option<NodePath>,
}

pub struct Registry<'c> {
    attrs: &'c AttributeNames,
}

impl<'c> Registry<'c> {
    pub fn new(config: &'c OverlayConfig) -> Self {
        Self {
            attrs: &config.attributes,
        }
    }

    pub fn is_tagged<T: RenderTree>(&self, tree: &T, node: &T::Node) -> bool {
        tree.has_attribute(node, &self.attrs.node)
    }

    /// Decoded address; an unparsable address counts as untagged
    pub fn path_of<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Option<NodePath> {
        tree.attribute(node, &self.attrs.node)?.parse().ok()
    }

    pub fn alias_of<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Option<NodePath> {
        tree.attribute(node, &self.attrs.component_node)?.parse().ok()
    }

    /// Structure id on the element or its nearest ancestor carrying one
    pub fn structure_of<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Option<String> {
        let owner = tree.closest_with_attribute(node, &self.attrs.structure)?;
        tree.attribute(&owner, &self.attrs.structure)
    }

    pub fn snapshot<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Option<Tagged<T::Node>> {
        Some(Tagged {
            path: self.path_of(tree, node)?,
            structure: self.structure_of(tree, node),
            alias: self.alias_of(tree, node),
            node: node.clone(),
        })
    }

    /// Exact match on structure and address, falling back to a search inside
    /// the structure's first container for elements that inherit the id.
    pub fn find_by_address<T: RenderTree>(
        &self,
        tree: &T,
        structure: &str,
        path: &NodePath,
    ) -> Option<T::Node> {
        let document = tree.descendants(&tree.document_element());

        let exact = document.iter().find(|node| {
            tree.attribute(node, &self.attrs.structure).as_deref() == Some(structure)
                && self.path_of(tree, node).as_ref() == Some(path)
        });
        if let Some(node) = exact {
            return Some(node.clone());
        }

        let container = document
            .iter()
            .find(|node| tree.attribute(node, &self.attrs.structure).as_deref() == Some(structure))?;
        tree.descendants(container)
            .into_iter()
            .find(|node| self.path_of(tree, node).as_ref() == Some(path))
    }

    /// Every tagged element in document order, optionally limited to one structure
    pub fn all_tagged<T: RenderTree>(&self, tree: &T, structure: Option<&str>) -> Vec<Tagged<T::Node>> {
        tree.descendants(&tree.document_element())
            .into_iter()
            .filter_map(|node| self.snapshot(tree, &node))
            .filter(|tagged| match structure {
                Some(s) => tagged.structure.as_deref() == Some(s),
                None => true,
            })
            .collect()
    }

    /// Tagged elements of `structure` with no tagged ancestor in the same structure
    pub fn structural_roots<T: RenderTree>(&self, tree: &T, structure: &str) -> Vec<T::Node> {
        self.all_tagged(tree, Some(structure))
            .into_iter()
            .filter(|tagged| {
                let mut ancestor = tree.parent(&tagged.node);
                while let Some(a) = ancestor {
                    if self.is_tagged(tree, &a) && self.structure_of(tree, &a).as_deref() == Some(structure) {
                        return false;
                    }
                    ancestor = tree.parent(&a);
                }
                true
            })
            .map(|tagged| tagged.node)
            .collect()
    }

    /// Nearest tagged descendants of `parent` in document order.
    ///
    /// Untagged wrappers are looked through. A tagged element of another
    /// structure is a boundary: it is neither returned nor searched.
    pub fn direct_structural_children<T: RenderTree>(&self, tree: &T, parent: &T::Node) -> Vec<T::Node> {
        let structure = self.structure_of(tree, parent);
        let mut out = Vec::new();
        self.collect_structural_children(tree, parent, structure.as_deref(), &mut out);
        out
    }

    fn collect_structural_children<T: RenderTree>(
        &self,
        tree: &T,
        node: &T::Node,
        structure: Option<&str>,
        out: &mut Vec<T::Node>,
    ) {
        for child in tree.children(node) {
            if self.is_tagged(tree, &child) {
                if self.structure_of(tree, &child).as_deref() == structure {
                    out.push(child);
                }
            } else {
                self.collect_structural_children(tree, &child, structure, out);
            }
        }
    }

    pub fn is_ignored<T: RenderTree>(&self, tree: &T, node: &T::Node) -> bool {
        IGNORED_TAGS.contains(&tree.tag_name(node).as_str())
    }

    /// Resolve a raw pointer target to the element the operator means:
    /// the nearest tagged element, widened to the component root when it
    /// sits inside a component.
    pub fn selectable_target<T: RenderTree>(&self, tree: &T, raw: &T::Node) -> Option<T::Node> {
        if *raw == tree.document_element() || Some(raw) == tree.body().as_ref() {
            return None;
        }
        if self.is_ignored(tree, raw) {
            return None;
        }

        let element = self.closest_tagged(tree, raw)?;
        if tree.has_attribute(&element, &self.attrs.in_component)
            && !tree.has_attribute(&element, &self.attrs.component)
        {
            if let Some(root) = tree.closest_with_attribute(&element, &self.attrs.component) {
                return Some(root);
            }
        }
        Some(element)
    }

    /// Like [`Self::selectable_target`], restricted to elements that may be dragged
    pub fn draggable_target<T: RenderTree>(&self, tree: &T, raw: &T::Node) -> Option<T::Node> {
        self.selectable_target(tree, raw)
            .filter(|target| self.is_draggable(tree, target))
    }

    /// Tagged, and either outside any component or a component root
    pub fn is_draggable<T: RenderTree>(&self, tree: &T, node: &T::Node) -> bool {
        self.is_tagged(tree, node)
            && (!tree.has_attribute(node, &self.attrs.in_component)
                || tree.has_attribute(node, &self.attrs.component))
    }

    pub fn closest_tagged<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Option<T::Node> {
        tree.closest_with_attribute(node, &self.attrs.node)
    }

    /// Tagged descendants of `node`, excluding `node`
    pub fn tagged_within<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Vec<T::Node> {
        tree.descendants(node)
            .into_iter()
            .filter(|n| self.is_tagged(tree, n))
            .collect()
    }

    /// Tagged element children of `node`'s parent, `node` included when tagged
    pub fn tagged_siblings<T: RenderTree>(&self, tree: &T, node: &T::Node) -> Vec<T::Node> {
        match tree.parent(node) {
            Some(parent) => tree
                .children(&parent)
                .into_iter()
                .filter(|n| self.is_tagged(tree, n))
                .collect(),
            None => Vec::new(),
        }
    }
}
