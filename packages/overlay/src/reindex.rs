//! # Reindexer
//!
//! Rewrites structural addresses after a tree-shape change.
//!
//! - [`insert_at`] opens a slot before an element is inserted: siblings at or
//!   after the index shift up, highest first, so no two elements ever share an
//!   address while the pass runs.
//! - [`remove_at`] closes a slot after an element was detached: siblings
//!   after the index shift down, lowest first.
//! - [`full_resync`] recomputes a whole structure from the live tree. Used
//!   after drag/drop, which can move subtrees across parents.
//!
//! Every rewrite also moves the component alias attribute when it mirrors
//! the rewritten address. All functions return the number of elements whose
//! address changed.

use crate::config::OverlayConfig;
use crate::path::NodePath;
use crate::registry::Registry;
use canopy_dom::RenderTree;
use tracing::{debug, warn};

/// Shift every sibling in `parent` at index `>= index` up by one
pub fn insert_at<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    parent: &NodePath,
    index: u32,
) -> usize {
    let registry = Registry::new(config);
    let mut siblings: Vec<_> = registry
        .all_tagged(tree, Some(structure))
        .into_iter()
        .filter(|tagged| tagged.path.parent() == *parent)
        .filter(|tagged| matches!(tagged.path.last_index(), Some(i) if i >= index))
        .collect();
    siblings.sort_by(|a, b| b.path.last_index().cmp(&a.path.last_index()));

    debug!(%structure, parent = %parent, index, siblings = siblings.len(), "Opening sibling slot");

    let mut count = 0;
    for tagged in siblings {
        let Some(last) = tagged.path.last_index() else {
            continue;
        };
        let shifted = tagged.path.with_last_index(last + 1);
        count += shift_subtree(tree, config, structure, &tagged.node, &tagged.path, &shifted);
    }
    count
}

/// Shift every sibling in `parent` at index `> index` down by one
pub fn remove_at<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    parent: &NodePath,
    index: u32,
) -> usize {
    let registry = Registry::new(config);
    let mut siblings: Vec<_> = registry
        .all_tagged(tree, Some(structure))
        .into_iter()
        .filter(|tagged| tagged.path.parent() == *parent)
        .filter(|tagged| matches!(tagged.path.last_index(), Some(i) if i > index))
        .collect();
    siblings.sort_by(|a, b| a.path.last_index().cmp(&b.path.last_index()));

    debug!(%structure, parent = %parent, index, siblings = siblings.len(), "Closing sibling slot");

    let mut count = 0;
    for tagged in siblings {
        let Some(last) = tagged.path.last_index() else {
            continue;
        };
        let shifted = tagged.path.with_last_index(last - 1);
        count += shift_subtree(tree, config, structure, &tagged.node, &tagged.path, &shifted);
    }
    count
}

/// Recompute every address of `structure` from the live tree shape
pub fn full_resync<T: RenderTree>(tree: &mut T, config: &OverlayConfig, structure: &str) -> usize {
    let registry = Registry::new(config);
    let roots = registry.structural_roots(tree, structure);
    if roots.is_empty() {
        warn!(%structure, "No structural roots found");
        return 0;
    }

    let mut count = 0;
    for (index, root) in roots.iter().enumerate() {
        let path = NodePath::root().child(index as u32);
        count += resync_node(tree, config, root, &path);
    }

    debug!(%structure, rewritten = count, "Full resync complete");
    count
}

fn resync_node<T: RenderTree>(tree: &mut T, config: &OverlayConfig, node: &T::Node, path: &NodePath) -> usize {
    let mut count = usize::from(assign(tree, config, node, path));

    let children = Registry::new(config).direct_structural_children(tree, node);
    for (index, child) in children.iter().enumerate() {
        count += resync_node(tree, config, child, &path.child(index as u32));
    }
    count
}

/// Rewrite `node` from `old` to `new`, then carry the same prefix change to
/// every tagged descendant of the same structure.
fn shift_subtree<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    node: &T::Node,
    old: &NodePath,
    new: &NodePath,
) -> usize {
    let mut count = usize::from(assign(tree, config, node, new));

    let registry = Registry::new(config);
    let descendants: Vec<_> = registry
        .tagged_within(tree, node)
        .into_iter()
        .filter_map(|n| registry.snapshot(tree, &n))
        .filter(|tagged| tagged.structure.as_deref() == Some(structure))
        .collect();

    for tagged in descendants {
        if tagged.path == *old {
            continue;
        }
        if let Some(rebased) = tagged.path.rebase(old, new) {
            count += usize::from(assign(tree, config, &tagged.node, &rebased));
        }
    }
    count
}

/// Write `path` onto `node`, moving the alias along with it.
/// Returns whether the address changed.
pub(crate) fn assign<T: RenderTree>(tree: &mut T, config: &OverlayConfig, node: &T::Node, path: &NodePath) -> bool {
    let registry = Registry::new(config);
    let attrs = &config.attributes;

    let old = registry.path_of(tree, node);
    if old.as_ref() == Some(path) {
        return false;
    }
    tree.set_attribute(node, &attrs.node, &path.to_string());

    if let (Some(old), Some(alias)) = (old.as_ref(), registry.alias_of(tree, node)) {
        if let Some(rebased) = alias.rebase(old, path) {
            tree.set_attribute(node, &attrs.component_node, &rebased.to_string());
        }
    }

    match old {
        Some(old) => debug!(from = %old, to = %path, "Reindexed node"),
        None => debug!(to = %path, "Indexed node"),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_dom::{MemoryDom, NodeId};

    fn dom(markup: &str) -> MemoryDom {
        MemoryDom::from_markup(markup).unwrap()
    }

    fn address(dom: &MemoryDom, id: &str) -> String {
        let node: NodeId = dom.query_selector(&format!("#{}", id)).unwrap().unwrap();
        dom.attribute(&node, "data-qs-node").unwrap()
    }

    const LIST: &str = r#"
        <ul data-qs-struct="page" data-qs-node="0">
            <li id="a" data-qs-struct="page" data-qs-node="0.0"></li>
            <li id="b" data-qs-struct="page" data-qs-node="0.1"><i id="bi" data-qs-struct="page" data-qs-node="0.1.0"></i></li>
            <li id="c" data-qs-struct="page" data-qs-node="0.2" data-qs-component-node="0.2"></li>
        </ul>
        <ol data-qs-struct="other" data-qs-node="0"><li id="x" data-qs-struct="other" data-qs-node="0.1"></li></ol>
    "#;

    #[test]
    fn test_insert_at_shifts_siblings_and_descendants() {
        let mut dom = dom(LIST);
        let config = OverlayConfig::default();
        let count = insert_at(&mut dom, &config, "page", &"0".parse().unwrap(), 1);

        assert_eq!(count, 3);
        assert_eq!(address(&dom, "a"), "0.0");
        assert_eq!(address(&dom, "b"), "0.2");
        assert_eq!(address(&dom, "bi"), "0.2.0");
        assert_eq!(address(&dom, "c"), "0.3");
        // Other structures are untouched
        assert_eq!(address(&dom, "x"), "0.1");

        let c = dom.query_selector("#c").unwrap().unwrap();
        assert_eq!(dom.attribute(&c, "data-qs-component-node").as_deref(), Some("0.3"));
    }

    #[test]
    fn test_remove_at_closes_gap() {
        let mut dom = dom(LIST);
        let config = OverlayConfig::default();
        let a = dom.query_selector("#a").unwrap().unwrap();
        dom.detach(&a);

        remove_at(&mut dom, &config, "page", &"0".parse().unwrap(), 0);
        assert_eq!(address(&dom, "b"), "0.0");
        assert_eq!(address(&dom, "bi"), "0.0.0");
        assert_eq!(address(&dom, "c"), "0.1");
    }

    #[test]
    fn test_full_resync_repairs_and_is_idempotent() {
        let mut dom = dom(
            r#"<div data-qs-struct="page" data-qs-node="5">
                <p id="p1" data-qs-struct="page" data-qs-node="5.7"></p>
                <span><p id="p2" data-qs-struct="page" data-qs-node="5.7"></p></span>
            </div>
            <div id="second" data-qs-struct="page" data-qs-node="5"></div>"#,
        );
        let config = OverlayConfig::default();

        assert_eq!(full_resync(&mut dom, &config, "page"), 4);
        assert_eq!(address(&dom, "p1"), "0.0");
        assert_eq!(address(&dom, "p2"), "0.1");
        assert_eq!(address(&dom, "second"), "1");

        assert_eq!(full_resync(&mut dom, &config, "page"), 0);
    }

    #[test]
    fn test_full_resync_of_unknown_structure() {
        let mut dom = dom(LIST);
        let config = OverlayConfig::default();
        assert_eq!(full_resync(&mut dom, &config, "nope"), 0);
    }
}
