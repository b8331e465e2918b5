//! # DOM Mutations
//!
//! The four host-driven shape changes. Each resolves its target first and
//! validates the incoming fragment before touching any address, so a failed
//! operation leaves the tree as it found it.
//!
//! ## Ordering
//!
//! - **Insert / Duplicate**: open the slot ([`reindex::insert_at`]), then splice;
//!   a rejected splice closes the slot again
//! - **Remove**: detach, then close the slot ([`reindex::remove_at`])
//! - **Replace**: swap in place; addresses do not move

use crate::config::{Marker, OverlayConfig};
use crate::errors::{OverlayError, OverlayResult};
use crate::path::NodePath;
use crate::reindex;
use crate::registry::Registry;
use canopy_dom::RenderTree;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Placement relative to a target element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    Inside,
    After,
}

/// Classes that describe interaction state and never belong on a copy
const STATE_MARKERS: &[Marker] = &[
    Marker::Hover,
    Marker::Selected,
    Marker::StyleSelected,
    Marker::JsSelected,
    Marker::SelectorHover,
    Marker::SelectorSelected,
];

fn resolve<T: RenderTree>(
    tree: &T,
    config: &OverlayConfig,
    structure: &str,
    path: &NodePath,
) -> OverlayResult<T::Node> {
    Registry::new(config)
        .find_by_address(tree, structure, path)
        .ok_or_else(|| OverlayError::not_found(structure, &path.to_string()))
}

fn parent_of<T: RenderTree>(tree: &T, node: &T::Node) -> OverlayResult<T::Node> {
    tree.parent(node)
        .ok_or_else(|| OverlayError::HierarchyViolation("target has no parent".to_string()))
}

/// Parse `html` into a detached element, taking the first root element
fn parse_single<T: RenderTree>(tree: &mut T, html: &str) -> OverlayResult<T::Node> {
    tree.parse_fragment(html)
        .map_err(|_| OverlayError::InvalidContent)?
        .into_iter()
        .next()
        .ok_or(OverlayError::InvalidContent)
}

/// Give a fragment root the structure id and address it will occupy, unless
/// the markup already carries them
fn stamp<T: RenderTree>(tree: &mut T, config: &OverlayConfig, node: &T::Node, structure: &str, path: &NodePath) {
    let attrs = &config.attributes;
    if !tree.has_attribute(node, &attrs.structure) {
        tree.set_attribute(node, &attrs.structure, structure);
    }
    if !tree.has_attribute(node, &attrs.node) {
        tree.set_attribute(node, &attrs.node, &path.to_string());
    }
}

/// Insert `html` next to or inside the element at `target`, opening the slot
/// named by `new_path` first. Returns the inserted element.
pub fn insert<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    target: &NodePath,
    position: Position,
    html: &str,
    new_path: &NodePath,
) -> OverlayResult<T::Node> {
    let target_el = resolve(tree, config, structure, target)?;
    let (parent_path, index) = new_path.slot()?;
    let splice_parent = match position {
        Position::Inside => target_el.clone(),
        Position::Before | Position::After => parent_of(tree, &target_el)?,
    };

    let new_el = parse_single(tree, html)?;
    stamp(tree, config, &new_el, structure, new_path);

    let shifted = reindex::insert_at(tree, config, structure, &parent_path, index);

    let reference = match position {
        Position::Before => Some(target_el.clone()),
        Position::After => tree.next_sibling(&target_el),
        Position::Inside => tree.first_child(&target_el),
    };
    if let Err(e) = tree.insert_before(&splice_parent, &new_el, reference.as_ref()) {
        reindex::remove_at(tree, config, structure, &parent_path, index);
        return Err(e.into());
    }
    tree.scroll_into_view(&new_el);

    info!(%structure, target = %target, ?position, new = %new_path, shifted, "Node inserted");
    Ok(new_el)
}

/// Swap the element at `path` for the element parsed from `html`
pub fn replace<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    path: &NodePath,
    html: &str,
) -> OverlayResult<T::Node> {
    let old_el = resolve(tree, config, structure, path)?;
    let parent = parent_of(tree, &old_el)?;

    let new_el = parse_single(tree, html)?;
    stamp(tree, config, &new_el, structure, path);
    tree.replace_child(&parent, &new_el, &old_el)?;

    info!(%structure, node = %path, "Node updated");
    Ok(new_el)
}

/// Detach the element at `path` and close its slot
pub fn remove<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    path: &NodePath,
) -> OverlayResult<()> {
    let target_el = resolve(tree, config, structure, path)?;
    tree.detach(&target_el);

    let shifted = match path.slot() {
        Ok((parent_path, index)) => reindex::remove_at(tree, config, structure, &parent_path, index),
        Err(_) => 0,
    };

    info!(%structure, node = %path, shifted, "Node removed");
    Ok(())
}

/// Copy the element at `source` into the slot `new_path`, directly after it
pub fn duplicate<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    structure: &str,
    source: &NodePath,
    new_path: &NodePath,
) -> OverlayResult<T::Node> {
    let registry = Registry::new(config);
    let attrs = &config.attributes;

    let source_el = resolve(tree, config, structure, source)?;
    let parent = parent_of(tree, &source_el)?;
    let (parent_path, index) = new_path.slot()?;

    let shifted = reindex::insert_at(tree, config, structure, &parent_path, index);

    // The source itself may have shifted when the slot opened at or before it
    let source_path = registry.path_of(tree, &source_el).unwrap_or_else(|| source.clone());

    let clone = tree.deep_clone(&source_el);
    let mut copied = vec![clone.clone()];
    copied.extend(tree.descendants(&clone));

    for node in &copied {
        if let Some(path) = registry.path_of(tree, node) {
            if let Some(rebased) = path.rebase(&source_path, new_path) {
                tree.set_attribute(node, &attrs.node, &rebased.to_string());
            }
        }
        if let Some(alias) = registry.alias_of(tree, node) {
            if let Some(rebased) = alias.rebase(&source_path, new_path) {
                tree.set_attribute(node, &attrs.component_node, &rebased.to_string());
            }
        }
        for marker in STATE_MARKERS {
            tree.remove_class(node, &config.class(*marker));
        }
    }

    let reference = tree.next_sibling(&source_el);
    if let Err(e) = tree.insert_before(&parent, &clone, reference.as_ref()) {
        reindex::remove_at(tree, config, structure, &parent_path, index);
        return Err(e.into());
    }
    tree.scroll_into_view(&clone);

    info!(%structure, source = %source, new = %new_path, shifted, "Node duplicated");
    Ok(clone)
}
