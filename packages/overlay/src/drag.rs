//! # Drag/Drop State Machine
//!
//! ```text
//! Idle ──pointer down──▶ Pending ──moved ≥ threshold──▶ Active
//!   ▲                      │                              │
//!   └──── pointer up ──────┘ (click)          pointer up  ▼
//!   └──────────────────────────────────────────────── Resolving
//! ```
//!
//! Nothing moves in the tree while a drag is active; the splice happens once,
//! on release. A successful move leaves a residual [`Anchor`] behind so the
//! host can roll the move back if persisting it fails. The residual is
//! dropped on the next drag start, on cancel, or when drag mode ends.

use crate::config::{Marker, OverlayConfig};
use crate::inspect::{element_info, ElementInfo};
use crate::mutations::Position;
use crate::registry::Registry;
use canopy_dom::{DomResult, Rect, RenderTree};
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// Where an element sat before it was dragged
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor<N> {
    pub node: N,
    pub parent: N,
    pub next_sibling: Option<N>,
}

impl<N: Clone + PartialEq + Debug> Anchor<N> {
    /// `None` for detached nodes
    pub fn capture<T: RenderTree<Node = N>>(tree: &T, node: &N) -> Option<Self> {
        Some(Self {
            node: node.clone(),
            parent: tree.parent(node)?,
            next_sibling: tree.next_sibling(node),
        })
    }

    /// Put the node back before its original next sibling, or at the end of
    /// the original parent when that sibling has moved away
    pub fn restore<T: RenderTree<Node = N>>(&self, tree: &mut T) -> DomResult<()> {
        match &self.next_sibling {
            Some(sibling) if tree.parent(sibling).as_ref() == Some(&self.parent) => {
                tree.insert_before(&self.parent, &self.node, Some(sibling))
            }
            _ => tree.append_child(&self.parent, &self.node),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<N> {
    pub target: N,
    pub zone: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState<N> {
    Idle,
    Pending {
        source: N,
        snapshot: ElementInfo,
        start: (f64, f64),
    },
    Active {
        source: N,
        snapshot: ElementInfo,
        anchor: Anchor<N>,
        ghost: N,
        candidate: Option<Candidate<N>>,
    },
    Resolving,
}

/// What the host should hear about after a pointer event
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// The threshold was crossed
    Started(ElementInfo),
    /// Released before the threshold; still reported so the info panel updates
    Clicked(ElementInfo),
    Moved {
        source: ElementInfo,
        target: ElementInfo,
        zone: Position,
    },
}

#[derive(Debug)]
pub struct DragMachine<N> {
    state: DragState<N>,
    residual: Option<Anchor<N>>,
    indicator: Option<N>,
    cue: Option<N>,
}

impl<N> Default for DragMachine<N> {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
            residual: None,
            indicator: None,
            cue: None,
        }
    }
}

/// Zone from the pointer's vertical position inside `rect`: the outer 30%
/// bands are `before`/`after`, the middle 40% is `inside`. Targets shorter
/// than `min_inside_height` split at the midpoint instead.
pub fn drop_zone(rect: &Rect, y: f64, min_inside_height: f64) -> Position {
    let relative = y - rect.top();
    let height = rect.height;

    if height < min_inside_height {
        return if relative < height / 2.0 {
            Position::Before
        } else {
            Position::After
        };
    }

    let edge = height * 3.0 / 10.0;
    if relative < edge {
        Position::Before
    } else if relative > height - edge {
        Position::After
    } else {
        Position::Inside
    }
}

/// A drop is legal between distinct elements of the same structure, as long
/// as the target is not inside the source
pub fn can_drop_at<T: RenderTree>(
    tree: &T,
    config: &OverlayConfig,
    source: &T::Node,
    target: &T::Node,
    _zone: Position,
) -> bool {
    if source == target || tree.contains(source, target) {
        return false;
    }
    let registry = Registry::new(config);
    registry.structure_of(tree, source) == registry.structure_of(tree, target)
}

/// Whether dropping would change anything, judged against the current tree
pub fn is_meaningful_move<T: RenderTree>(tree: &T, source: &T::Node, target: &T::Node, zone: Position) -> bool {
    match zone {
        // Appending can still change the trailing position
        Position::Inside => true,
        Position::Before => tree.next_sibling(source).as_ref() != Some(target),
        Position::After => tree.next_sibling(target).as_ref() != Some(source),
    }
}

fn splice<T: RenderTree>(tree: &mut T, source: &T::Node, target: &T::Node, zone: Position) -> DomResult<()> {
    match zone {
        Position::Inside => tree.append_child(target, source),
        Position::Before | Position::After => {
            let parent = tree
                .parent(target)
                .ok_or_else(|| canopy_dom::DomError::hierarchy("drop target has no parent"))?;
            let reference = match zone {
                Position::Before => Some(target.clone()),
                _ => tree.next_sibling(target),
            };
            tree.insert_before(&parent, source, reference.as_ref())
        }
    }
}

fn px(value: f64) -> String {
    format!("{}px", value)
}

fn strip_class_everywhere<T: RenderTree>(tree: &mut T, class: &str) {
    for node in tree.descendants(&tree.document_element()) {
        if tree.has_class(&node, class) {
            tree.remove_class(&node, class);
        }
    }
}

impl<N: Clone + PartialEq + Debug> DragMachine<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState<N> {
        &self.state
    }

    /// Pending or active
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Pending { .. } | DragState::Active { .. })
    }

    pub fn residual(&self) -> Option<&Anchor<N>> {
        self.residual.as_ref()
    }

    pub fn indicator(&self) -> Option<&N> {
        self.indicator.as_ref()
    }

    /// Element currently showing the rollback cue
    pub fn cue(&self) -> Option<&N> {
        self.cue.as_ref()
    }

    /// Mark draggable elements and create the hidden drop indicator
    pub fn enable<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        let registry = Registry::new(config);
        let draggable = config.class(Marker::Draggable);
        let mut marked = 0;
        for node in registry.tagged_within(tree, &tree.document_element()) {
            if registry.is_draggable(tree, &node) {
                tree.add_class(&node, &draggable);
                marked += 1;
            }
        }

        if let Some(old) = self.indicator.take() {
            tree.detach(&old);
        }
        let indicator = tree.create_element("div");
        tree.add_class(&indicator, &config.class(Marker::DropIndicator));
        tree.set_style_property(&indicator, "display", "none");
        if let Some(body) = tree.body() {
            if let Err(e) = tree.append_child(&body, &indicator) {
                warn!(error = %e, "Could not attach drop indicator");
            }
        }
        self.indicator = Some(indicator);

        info!(draggable = marked, "Drag mode enabled");
    }

    /// Remove every drag marker and overlay element and forget all drag state
    pub fn disable<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        for marker in [
            Marker::Draggable,
            Marker::Dragging,
            Marker::DragOver,
            Marker::DropTargetInside,
            Marker::DragShifting,
            Marker::DragRollback,
        ] {
            strip_class_everywhere(tree, &config.class(marker));
        }

        if let Some(indicator) = self.indicator.take() {
            tree.detach(&indicator);
        }
        if let DragState::Active { ghost, .. } = &self.state {
            tree.detach(ghost);
        }

        self.state = DragState::Idle;
        self.residual = None;
        self.cue = None;
        info!("Drag mode disabled");
    }

    /// Start a pending drag when `raw` resolves to a draggable element.
    /// Returns whether a drag is now pending.
    pub fn pointer_down<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        raw: &N,
        x: f64,
        y: f64,
    ) -> bool {
        let registry = Registry::new(config);
        let Some(source) = registry.draggable_target(tree, raw) else {
            return false;
        };
        if !tree.has_class(&source, &config.class(Marker::Draggable)) {
            return false;
        }

        // Leftovers from the previous drag, including its rollback anchor
        if let Some(anchor) = self.residual.take() {
            tree.remove_class(&anchor.node, &config.class(Marker::Dragging));
        }
        if let DragState::Active { ghost, .. } = &self.state {
            tree.detach(ghost);
        }

        let snapshot = element_info(tree, config, &source);
        debug!(node = ?snapshot.node, "Drag pending");
        self.state = DragState::Pending {
            source,
            snapshot,
            start: (x, y),
        };
        true
    }

    pub fn pointer_move<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        x: f64,
        y: f64,
    ) -> Option<DragOutcome> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Pending {
                source,
                snapshot,
                start,
            } => {
                let (dx, dy) = (x - start.0, y - start.1);
                if (dx * dx + dy * dy).sqrt() < config.drag_threshold {
                    self.state = DragState::Pending {
                        source,
                        snapshot,
                        start,
                    };
                    return None;
                }

                let Some(anchor) = Anchor::capture(tree, &source) else {
                    warn!("Drag source is detached; dropping the drag");
                    return None;
                };
                let ghost = self.activate(tree, config, &source, x, y);
                self.state = DragState::Active {
                    source,
                    snapshot: snapshot.clone(),
                    anchor,
                    ghost,
                    candidate: None,
                };
                self.track(tree, config, x, y);
                Some(DragOutcome::Started(snapshot))
            }
            state @ DragState::Active { .. } => {
                self.state = state;
                self.track(tree, config, x, y);
                None
            }
            state => {
                self.state = state;
                None
            }
        }
    }

    fn activate<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        source: &N,
        x: f64,
        y: f64,
    ) -> N {
        tree.add_class(source, &config.class(Marker::Dragging));

        let ghost = build_ghost(tree, config, source);
        position_ghost(tree, config, &ghost, x, y);

        let registry = Registry::new(config);
        let shifting = config.class(Marker::DragShifting);
        for sibling in registry.tagged_siblings(tree, source) {
            if sibling != *source {
                tree.add_class(&sibling, &shifting);
            }
        }

        info!("Drag activated");
        ghost
    }

    /// Follow the pointer: move the ghost and update the drop candidate
    fn track<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, x: f64, y: f64) {
        let DragState::Active {
            source,
            ghost,
            candidate,
            ..
        } = &mut self.state
        else {
            return;
        };
        let source = source.clone();
        let ghost = ghost.clone();

        position_ghost(tree, config, &ghost, x, y);

        let draggable = config.class(Marker::Draggable);
        let mut stack = tree
            .elements_at_point(x, y)
            .into_iter()
            .filter(|el| *el != ghost && Some(el) != self.indicator.as_ref())
            .peekable();

        // Over the source itself: keep the last candidate
        if stack.peek().is_some_and(|top| tree.contains(&source, top)) {
            return;
        }
        let hit = stack.find(|el| !tree.contains(&source, el) && tree.has_class(el, &draggable));

        // Empty space: keep the last candidate
        let Some(target) = hit else {
            return;
        };

        let zone = drop_zone(&tree.bounding_rect(&target), y, config.min_inside_height);
        let over = config.class(Marker::DragOver);
        let inside = config.class(Marker::DropTargetInside);

        if can_drop_at(tree, config, &source, &target, zone) {
            if let Some(previous) = candidate.as_ref() {
                if previous.target != target {
                    tree.remove_class(&previous.target, &over);
                    tree.remove_class(&previous.target, &inside);
                }
            }
            if zone == Position::Inside {
                tree.add_class(&target, &inside);
                tree.remove_class(&target, &over);
            } else {
                tree.add_class(&target, &over);
                tree.remove_class(&target, &inside);
            }
            show_indicator(tree, config, self.indicator.as_ref(), &target, zone);
            *candidate = Some(Candidate { target, zone });
        } else if let Some(previous) = candidate.take() {
            tree.remove_class(&previous.target, &over);
            tree.remove_class(&previous.target, &inside);
            hide_indicator(tree, config, self.indicator.as_ref());
        }
    }

    /// Release: a click reports the snapshot, an active drag resolves
    pub fn pointer_up<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) -> Option<DragOutcome> {
        match std::mem::replace(&mut self.state, DragState::Resolving) {
            DragState::Pending { snapshot, .. } => {
                self.state = DragState::Idle;
                Some(DragOutcome::Clicked(snapshot))
            }
            DragState::Active {
                source,
                snapshot,
                anchor,
                ghost,
                candidate,
            } => {
                self.clear_visuals(tree, config, &source, &ghost, candidate.as_ref());
                let outcome = self.resolve(tree, config, &source, snapshot, anchor, candidate);
                self.state = DragState::Idle;
                outcome
            }
            _ => {
                self.state = DragState::Idle;
                None
            }
        }
    }

    fn resolve<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        source: &N,
        snapshot: ElementInfo,
        anchor: Anchor<N>,
        candidate: Option<Candidate<N>>,
    ) -> Option<DragOutcome> {
        let Some(Candidate { target, zone }) = candidate else {
            debug!("No valid drop target");
            return None;
        };
        if !is_meaningful_move(tree, source, &target, zone) {
            debug!(?zone, "No meaningful move");
            return None;
        }

        if let Err(e) = splice(tree, source, &target, zone) {
            warn!(error = %e, "Drop failed");
            return None;
        }

        self.residual = Some(anchor);
        let target_info = element_info(tree, config, &target);
        info!(source = ?snapshot.node, target = ?target_info.node, ?zone, "Drop confirmed");
        Some(DragOutcome::Moved {
            source: snapshot,
            target: target_info,
            zone,
        })
    }

    fn clear_visuals<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        source: &N,
        ghost: &N,
        candidate: Option<&Candidate<N>>,
    ) {
        tree.remove_class(source, &config.class(Marker::Dragging));
        if let Some(candidate) = candidate {
            tree.remove_class(&candidate.target, &config.class(Marker::DragOver));
            tree.remove_class(&candidate.target, &config.class(Marker::DropTargetInside));
        }
        hide_indicator(tree, config, self.indicator.as_ref());
        tree.detach(ghost);
        strip_class_everywhere(tree, &config.class(Marker::DragShifting));
        strip_class_everywhere(tree, &config.class(Marker::DropTargetInside));
    }

    /// Interrupt the current drag. An active drag is put back where it
    /// started. Returns whether there was anything to cancel.
    pub fn cancel<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) -> bool {
        let cancelled = match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Pending { .. } => true,
            DragState::Active {
                source,
                anchor,
                ghost,
                candidate,
                ..
            } => {
                self.clear_visuals(tree, config, &source, &ghost, candidate.as_ref());
                match anchor.restore(tree) {
                    Ok(()) => self.show_cue(tree, config, &anchor.node),
                    Err(e) => warn!(error = %e, "Could not restore cancelled drag"),
                }
                true
            }
            _ => false,
        };
        if cancelled {
            self.residual = None;
            info!("Drag cancelled");
        }
        cancelled
    }

    /// Undo the last completed move. Returns whether anything was restored.
    pub fn rollback<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) -> bool {
        let Some(anchor) = self.residual.take() else {
            debug!("No drag to rollback");
            return false;
        };
        match anchor.restore(tree) {
            Ok(()) => {
                self.show_cue(tree, config, &anchor.node);
                info!("Drag rolled back");
                true
            }
            Err(e) => {
                warn!(error = %e, "Rollback failed");
                false
            }
        }
    }

    fn show_cue<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, node: &N) {
        let class = config.class(Marker::DragRollback);
        if let Some(previous) = self.cue.take() {
            tree.remove_class(&previous, &class);
        }
        tree.add_class(node, &class);
        self.cue = Some(node.clone());
    }

    /// Remove the rollback cue, if one is showing
    pub fn clear_cue<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        if let Some(node) = self.cue.take() {
            tree.remove_class(&node, &config.class(Marker::DragRollback));
        }
    }
}

/// Deep copy of `source` with every structural attribute and marker class
/// removed, so it never shows up in registry queries or hit-tests
fn build_ghost<T: RenderTree>(tree: &mut T, config: &OverlayConfig, source: &T::Node) -> T::Node {
    let attrs = &config.attributes;
    let ghost = tree.deep_clone(source);

    let mut nodes = vec![ghost.clone()];
    nodes.extend(tree.descendants(&ghost));
    for node in &nodes {
        for name in [
            &attrs.structure,
            &attrs.node,
            &attrs.component,
            &attrs.component_node,
            &attrs.in_component,
            &attrs.text_key,
        ] {
            tree.remove_attribute(node, name);
        }
        for class in tree.classes(node) {
            if config.is_marker_class(&class) {
                tree.remove_class(node, &class);
            }
        }
    }

    tree.remove_attribute(&ghost, "class");
    tree.add_class(&ghost, &config.class(Marker::DragGhost));

    let rect = tree.bounding_rect(source);
    tree.set_style_property(&ghost, "width", &px(rect.width));
    tree.set_style_property(&ghost, "height", &px(rect.height));
    tree.set_style_property(&ghost, "pointer-events", "none");

    if let Some(body) = tree.body() {
        if let Err(e) = tree.append_child(&body, &ghost) {
            warn!(error = %e, "Could not attach drag ghost");
        }
    }
    ghost
}

fn position_ghost<T: RenderTree>(tree: &mut T, config: &OverlayConfig, ghost: &T::Node, x: f64, y: f64) {
    let (scroll_left, scroll_top) = tree.scroll_offset();
    tree.set_style_property(ghost, "left", &px(x + scroll_left + config.ghost_offset.x));
    tree.set_style_property(ghost, "top", &px(y + scroll_top + config.ghost_offset.y));
}

/// A full outline for `inside`, a thin bar on the matching edge otherwise
fn show_indicator<T: RenderTree>(
    tree: &mut T,
    config: &OverlayConfig,
    indicator: Option<&T::Node>,
    target: &T::Node,
    zone: Position,
) {
    let Some(indicator) = indicator else {
        return;
    };
    let rect = tree.bounding_rect(target);
    let (scroll_left, scroll_top) = tree.scroll_offset();
    let inside = config.class(Marker::DropInside);

    tree.set_style_property(indicator, "display", "block");
    tree.set_style_property(indicator, "left", &px(rect.left() + scroll_left));
    tree.set_style_property(indicator, "width", &px(rect.width));

    match zone {
        Position::Inside => {
            tree.add_class(indicator, &inside);
            tree.set_style_property(indicator, "top", &px(rect.top() + scroll_top));
            tree.set_style_property(indicator, "height", &px(rect.height));
        }
        Position::Before => {
            tree.remove_class(indicator, &inside);
            tree.set_style_property(indicator, "top", &px(rect.top() + scroll_top - 2.0));
            tree.set_style_property(indicator, "height", "4px");
        }
        Position::After => {
            tree.remove_class(indicator, &inside);
            tree.set_style_property(indicator, "top", &px(rect.bottom() + scroll_top - 2.0));
            tree.set_style_property(indicator, "height", "4px");
        }
    }
}

fn hide_indicator<T: RenderTree>(tree: &mut T, config: &OverlayConfig, indicator: Option<&T::Node>) {
    if let Some(indicator) = indicator {
        tree.set_style_property(indicator, "display", "none");
        tree.remove_class(indicator, &config.class(Marker::DropInside));
        tree.set_style_property(indicator, "height", "4px");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_dom::{MemoryDom, NodeId};

    #[test]
    fn test_zone_boundaries() {
        let rect = Rect::new(0.0, 100.0, 300.0, 100.0);
        assert_eq!(drop_zone(&rect, 129.0, 30.0), Position::Before);
        assert_eq!(drop_zone(&rect, 130.0, 30.0), Position::Inside);
        assert_eq!(drop_zone(&rect, 170.0, 30.0), Position::Inside);
        assert_eq!(drop_zone(&rect, 171.0, 30.0), Position::After);

        let tall = Rect::new(0.0, 0.0, 300.0, 200.0);
        assert_eq!(drop_zone(&tall, 58.0, 30.0), Position::Before);
        assert_eq!(drop_zone(&tall, 60.0, 30.0), Position::Inside);
        assert_eq!(drop_zone(&tall, 140.0, 30.0), Position::Inside);
        assert_eq!(drop_zone(&tall, 142.0, 30.0), Position::After);
    }

    #[test]
    fn test_short_targets_split_at_midpoint() {
        let rect = Rect::new(0.0, 0.0, 300.0, 20.0);
        assert_eq!(drop_zone(&rect, 9.9, 30.0), Position::Before);
        assert_eq!(drop_zone(&rect, 10.0, 30.0), Position::After);
        assert_eq!(drop_zone(&rect, 15.0, 30.0), Position::After);
    }

    fn node(dom: &MemoryDom, id: &str) -> NodeId {
        dom.query_selector(&format!("#{}", id)).unwrap().unwrap()
    }

    #[test]
    fn test_cycles_and_foreign_structures_are_rejected() {
        let dom = MemoryDom::from_markup(
            r#"<div id="outer" data-qs-struct="page" data-qs-node="0"><p id="inner" data-qs-struct="page" data-qs-node="0.0"></p></div>
               <nav id="menu" data-qs-struct="menu" data-qs-node="0"></nav>
               <div id="other" data-qs-struct="page" data-qs-node="1"></div>"#,
        )
        .unwrap();
        let config = OverlayConfig::default();
        let (outer, inner) = (node(&dom, "outer"), node(&dom, "inner"));

        for zone in [Position::Before, Position::Inside, Position::After] {
            assert!(!can_drop_at(&dom, &config, &outer, &inner, zone));
            assert!(!can_drop_at(&dom, &config, &outer, &outer, zone));
            assert!(!can_drop_at(&dom, &config, &outer, &node(&dom, "menu"), zone));
            assert!(can_drop_at(&dom, &config, &inner, &node(&dom, "other"), zone));
        }
    }

    #[test]
    fn test_meaningful_move() {
        let dom = MemoryDom::from_markup(r#"<ul><li id="a"></li><li id="b"></li></ul>"#).unwrap();
        let (a, b) = (node(&dom, "a"), node(&dom, "b"));

        assert!(!is_meaningful_move(&dom, &a, &b, Position::Before));
        assert!(is_meaningful_move(&dom, &a, &b, Position::After));
        assert!(!is_meaningful_move(&dom, &b, &a, Position::After));
        assert!(is_meaningful_move(&dom, &b, &a, Position::Before));
        assert!(is_meaningful_move(&dom, &a, &b, Position::Inside));
    }

    #[test]
    fn test_anchor_falls_back_to_append() {
        let mut dom = MemoryDom::from_markup(r#"<ul id="l"><li id="a"></li><li id="b"></li></ul><ol id="o"></ol>"#).unwrap();
        let (a, b) = (node(&dom, "a"), node(&dom, "b"));
        let anchor = Anchor::capture(&dom, &a).unwrap();
        assert_eq!(anchor.next_sibling, Some(b));

        let ol = node(&dom, "o");
        dom.append_child(&ol, &a).unwrap();
        dom.append_child(&ol, &b).unwrap();
        anchor.restore(&mut dom).unwrap();
        assert_eq!(dom.children(&node(&dom, "l")), vec![a]);
    }
}
