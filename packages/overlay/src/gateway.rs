//! # Messaging Gateway
//!
//! [`Overlay`] owns the render tree, the config and the [`Session`]. Host
//! commands come in through [`Overlay::handle_message`] (raw channel
//! messages) or [`Overlay::dispatch`] (already parsed); local input comes in
//! through [`Overlay::handle_input`]. Outbound events queue up until the
//! binding drains them.
//!
//! No error leaves this module: failed mutations become `*Failed` events,
//! everything else is logged and dropped.

use crate::config::{Marker, OverlayConfig};
use crate::drag::DragOutcome;
use crate::errors::OverlayResult;
use crate::inspect::{element_info, has_interactions, interaction_summary, page_classes, style_info};
use crate::mutations;
use crate::path::NodePath;
use crate::protocol::{Command, Disposition, Event, InputEvent};
use crate::registry::Registry;
use crate::reindex;
use crate::selection::{mark_exclusive, strip_marker, Mode};
use crate::session::Session;
use crate::text_edit::TextChange;
use canopy_dom::RenderTree;
use serde_json::Value;
use tracing::{debug, info, warn};

pub struct Overlay<T: RenderTree> {
    tree: T,
    config: OverlayConfig,
    session: Session<T::Node>,
    outbox: Vec<Event>,
}

impl<T: RenderTree> Overlay<T> {
    /// Attach to `tree` and announce readiness to the host
    pub fn new(tree: T, config: OverlayConfig) -> Self {
        info!(host = %config.channel.host_source, "Overlay attached");
        Self {
            tree,
            config,
            session: Session::default(),
            outbox: vec![Event::OverlayReady],
        }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.tree
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn session(&self) -> &Session<T::Node> {
        &self.session
    }

    pub fn into_tree(self) -> T {
        self.tree
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    /// Queued events in wire form, tagged with the overlay source
    pub fn drain_messages(&mut self) -> Vec<Value> {
        let source = self.config.channel.overlay_source.clone();
        self.drain_events()
            .iter()
            .map(|event| event.to_message(&source))
            .collect()
    }

    /// Whether a rollback cue is showing and needs clearing later
    pub fn rollback_cue_pending(&self) -> bool {
        self.session.drag.cue().is_some()
    }

    pub fn clear_rollback_cue(&mut self) {
        self.session.drag.clear_cue(&mut self.tree, &self.config);
    }

    fn emit(&mut self, event: Event) {
        debug!(action = event.action(), "Event queued");
        self.outbox.push(event);
    }

    /// Handle one raw channel message. Messages from other sources and
    /// unknown actions are ignored. Returns whether a command ran.
    pub fn handle_message(&mut self, message: &Value) -> bool {
        let source = message.get("source").and_then(Value::as_str);
        if source != Some(self.config.channel.host_source.as_str()) {
            return false;
        }

        match serde_json::from_value::<Command>(message.clone()) {
            Ok(command) => {
                self.dispatch(command);
                true
            }
            Err(e) => {
                let action = message.get("action").and_then(Value::as_str).unwrap_or("");
                warn!(%action, error = %e, "Ignoring malformed command");
                false
            }
        }
    }

    pub fn dispatch(&mut self, command: Command) {
        debug!(action = command.name(), "Received command");

        match command {
            Command::SetMode { mode } => {
                self.session.set_mode(&mut self.tree, &self.config, mode);
            }
            Command::ClearSelection => {
                self.session.selection.clear_selection(&mut self.tree, &self.config);
            }
            Command::HighlightNode { structure, node } => {
                self.session.selection.clear_selection(&mut self.tree, &self.config);
                if let Some(el) = self.find(&structure, &node) {
                    self.session.selection.select(&mut self.tree, &self.config, &el);
                    self.tree.scroll_into_view(&el);
                }
            }
            Command::SelectNode { structure, node } => {
                self.session.selection.clear_selection(&mut self.tree, &self.config);
                if let Some(el) = self.find(&structure, &node) {
                    self.select_and_notify(&el);
                    self.tree.scroll_into_view(&el);
                }
            }
            Command::InsertNode {
                structure,
                target_node,
                position,
                html,
                new_node_id,
            } => {
                let result = parse_path(&target_node).and_then(|target| {
                    let new_path = parse_path(&new_node_id)?;
                    mutations::insert(
                        &mut self.tree,
                        &self.config,
                        &structure,
                        &target,
                        position,
                        &html,
                        &new_path,
                    )
                });
                if let Some(el) = self.report(result, |error| Event::InsertNodeFailed { error }) {
                    self.select_and_notify(&el);
                }
            }
            Command::UpdateNode {
                structure,
                node_id,
                html,
            } => {
                let result = parse_path(&node_id)
                    .and_then(|path| mutations::replace(&mut self.tree, &self.config, &structure, &path, &html));
                if let Some(el) = self.report(result, |error| Event::UpdateNodeFailed { error }) {
                    self.select_and_notify(&el);
                }
            }
            Command::RemoveNode { structure, node_id } => {
                let result = parse_path(&node_id)
                    .and_then(|path| mutations::remove(&mut self.tree, &self.config, &structure, &path));
                if self.report(result, |error| Event::RemoveNodeFailed { error }).is_some() {
                    self.emit(Event::RemoveNodeSuccess { node_id });
                    self.session.selection.clear_selection(&mut self.tree, &self.config);
                }
            }
            Command::DuplicateNode {
                structure,
                source_node_id,
                new_node_id,
            } => {
                let result = parse_path(&source_node_id).and_then(|source| {
                    let new_path = parse_path(&new_node_id)?;
                    mutations::duplicate(&mut self.tree, &self.config, &structure, &source, &new_path)
                });
                if let Some(el) = self.report(result, |error| Event::DuplicateNodeFailed { error }) {
                    self.select_and_notify(&el);
                }
            }
            Command::RollbackDrag => {
                self.session.drag.rollback(&mut self.tree, &self.config);
            }
            Command::ReindexNodes { structure } => {
                reindex::full_resync(&mut self.tree, &self.config, &structure);
            }
            Command::ShowStruct { structure } => self.set_structure_visible(&structure, true),
            Command::HideStruct { structure } => self.set_structure_visible(&structure, false),
            Command::ClearStyleSelection => {
                strip_marker(&mut self.tree, &self.config.class(Marker::StyleSelected));
            }
            Command::ApplyLiveStyle {
                structure,
                node_id,
                property,
                value,
            } => {
                if let Some(el) = self.find(&structure, &node_id) {
                    self.tree.set_style_property(&el, &property, &value);
                    debug!(%property, %value, "Live style applied");
                }
            }
            Command::HighlightBySelector { selector } => self.highlight_selector(&selector, false),
            Command::SelectBySelector { selector } => self.highlight_selector(&selector, true),
            Command::ClearSelectorHighlight => {
                self.session.clear_selector_highlight(&mut self.tree, &self.config);
            }
            Command::GetPageClasses => {
                let classes = page_classes(&self.tree, &self.config);
                debug!(count = classes.len(), "Page classes collected");
                self.emit(Event::PageClassesResult { classes });
            }
            Command::NavigateToParent { structure, node } => {
                let registry = Registry::new(&self.config);
                let parent = self.find(&structure, &node).and_then(|current| {
                    let parent = self.tree.parent(&current)?;
                    registry.closest_tagged(&self.tree, &parent)
                });
                self.navigate(parent);
            }
            Command::NavigateToPrevSibling { structure, node } => {
                let target = self.sibling_of(&structure, &node, -1);
                self.navigate(target);
            }
            Command::NavigateToNextSibling { structure, node } => {
                let target = self.sibling_of(&structure, &node, 1);
                self.navigate(target);
            }
            Command::NavigateToFirstChild { structure, node } => {
                let registry = Registry::new(&self.config);
                let child = self
                    .find(&structure, &node)
                    .and_then(|current| registry.tagged_within(&self.tree, &current).into_iter().next());
                self.navigate(child);
            }
        }
    }

    /// Turn a mutation result into either a value or a `*Failed` event
    fn report<V>(&mut self, result: OverlayResult<V>, failed: fn(String) -> Event) -> Option<V> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Mutation failed");
                self.emit(failed(e.to_string()));
                None
            }
        }
    }

    fn find(&self, structure: &str, address: &str) -> Option<T::Node> {
        let path = address.parse().ok()?;
        Registry::new(&self.config).find_by_address(&self.tree, structure, &path)
    }

    /// Tagged element sibling `offset` steps away from the element at `address`
    fn sibling_of(&self, structure: &str, address: &str, offset: isize) -> Option<T::Node> {
        let current = self.find(structure, address)?;
        let siblings = Registry::new(&self.config).tagged_siblings(&self.tree, &current);
        let index = siblings.iter().position(|s| *s == current)?;
        let target = index.checked_add_signed(offset)?;
        siblings.get(target).cloned()
    }

    fn navigate(&mut self, target: Option<T::Node>) {
        match target {
            Some(el) => self.select_and_notify(&el),
            None => debug!("Nothing to navigate to"),
        }
    }

    fn select_and_notify(&mut self, el: &T::Node) {
        self.session.selection.select(&mut self.tree, &self.config, el);
        let info = element_info(&self.tree, &self.config, el);
        self.emit(Event::ElementSelected(info));
    }

    fn set_structure_visible(&mut self, structure: &str, visible: bool) {
        let attr = &self.config.attributes.structure;
        let members: Vec<_> = self
            .tree
            .descendants(&self.tree.document_element())
            .into_iter()
            .filter(|node| self.tree.attribute(node, attr).as_deref() == Some(structure))
            .collect();

        let display = if visible { "" } else { "none" };
        for node in &members {
            self.tree.set_style_property(node, "display", display);
        }
        info!(%structure, visible, elements = members.len(), "Structure visibility changed");
    }

    fn highlight_selector(&mut self, selector: &str, select: bool) {
        if let Err(e) = self
            .session
            .highlight_selector(&mut self.tree, &self.config, selector, select)
        {
            warn!(%selector, error = %e, "Invalid selector");
        }
    }

    /// Handle one local input event
    pub fn handle_input(&mut self, input: InputEvent<T::Node>) -> Disposition {
        let mode = self.session.mode();
        match input {
            InputEvent::PointerDown { target, x, y } => match mode {
                Mode::Select => Disposition::PreventDefault,
                Mode::Drag => {
                    let pending = self
                        .session
                        .drag
                        .pointer_down(&mut self.tree, &self.config, &target, x, y);
                    Disposition::prevent_if(pending)
                }
                _ => Disposition::Default,
            },
            InputEvent::PointerMove { x, y } => {
                if mode != Mode::Drag || !self.session.drag.is_dragging() {
                    return Disposition::Default;
                }
                let outcome = self.session.drag.pointer_move(&mut self.tree, &self.config, x, y);
                self.on_drag_outcome(outcome);
                Disposition::PreventDefault
            }
            InputEvent::PointerUp { .. } => {
                if mode != Mode::Drag || !self.session.drag.is_dragging() {
                    return Disposition::Default;
                }
                let outcome = self.session.drag.pointer_up(&mut self.tree, &self.config);
                self.on_drag_outcome(outcome);
                Disposition::PreventDefault
            }
            InputEvent::PointerOver { target, x, y } => {
                self.on_pointer_over(mode, &target, x, y);
                Disposition::Default
            }
            InputEvent::PointerOut { target } => {
                self.on_pointer_out(mode, &target);
                Disposition::Default
            }
            InputEvent::Click { target } => {
                self.on_click(mode, &target);
                Disposition::prevent_if(mode.suppresses_click_default())
            }
            InputEvent::KeyDown { key } => self.on_key_down(mode, &key),
            InputEvent::Blur { target } => {
                if self.session.text.is_editing(&target) {
                    let change = self.session.text.finish(&mut self.tree, &self.config);
                    self.on_text_change(change);
                }
                Disposition::Default
            }
        }
    }

    fn on_drag_outcome(&mut self, outcome: Option<DragOutcome>) {
        match outcome {
            Some(DragOutcome::Started(info)) | Some(DragOutcome::Clicked(info)) => {
                self.emit(Event::DragStarted(info));
            }
            Some(DragOutcome::Moved { source, target, zone }) => {
                self.emit(Event::ElementMoved {
                    source_element: source,
                    target_element: target,
                    position: zone,
                });
            }
            None => {}
        }
    }

    fn on_pointer_over(&mut self, mode: Mode, raw: &T::Node, x: f64, y: f64) {
        let registry = Registry::new(&self.config);
        match mode {
            mode if mode.tracks_hover() => {
                if let Some(target) = registry.selectable_target(&self.tree, raw) {
                    self.session.selection.hover(&mut self.tree, &self.config, &target);
                }
            }
            // The tooltip describes the element itself, not its component
            Mode::Js => {
                let Some(target) = registry.closest_tagged(&self.tree, raw) else {
                    return;
                };
                if !has_interactions(&self.tree, &target) {
                    return;
                }
                let summary = interaction_summary(&self.tree, &target);
                if !summary.is_empty() {
                    self.session.show_tooltip(&mut self.tree, &self.config, &summary, x, y);
                }
            }
            _ => {}
        }
    }

    fn on_pointer_out(&mut self, mode: Mode, raw: &T::Node) {
        match mode {
            mode if mode.tracks_hover() => {
                let registry = Registry::new(&self.config);
                if let Some(target) = registry.selectable_target(&self.tree, raw) {
                    self.session.selection.unhover(&mut self.tree, &self.config, &target);
                }
            }
            Mode::Js => self.session.hide_tooltip(&mut self.tree),
            _ => {}
        }
    }

    fn on_click(&mut self, mode: Mode, raw: &T::Node) {
        let registry = Registry::new(&self.config);
        match mode {
            Mode::Select => {
                if let Some(target) = registry.selectable_target(&self.tree, raw) {
                    self.select_and_notify(&target);
                }
            }
            Mode::Text => {
                let bound = self
                    .tree
                    .closest_with_attribute(raw, &self.config.attributes.text_key);
                if let Some(el) = bound {
                    if !self.session.text.is_editing(&el) {
                        self.start_text_edit(&el);
                    }
                }
            }
            Mode::Style => {
                if let Some(target) = registry.selectable_target(&self.tree, raw) {
                    mark_exclusive(&mut self.tree, &self.config, &target, Marker::StyleSelected);
                    let element = element_info(&self.tree, &self.config, &target);
                    let style = style_info(&self.tree, &self.config, &target);
                    self.emit(Event::StyleSelected { element, style });
                }
            }
            Mode::Js => {
                if let Some(target) = registry.selectable_target(&self.tree, raw) {
                    mark_exclusive(&mut self.tree, &self.config, &target, Marker::JsSelected);
                    let element = element_info(&self.tree, &self.config, &target);
                    self.emit(Event::InteractionSelected { element });
                }
            }
            Mode::Drag | Mode::Add => {}
        }
    }

    fn start_text_edit(&mut self, el: &T::Node) {
        let committed = self.session.text.start(&mut self.tree, &self.config, el);
        self.on_text_change(committed);

        if self.session.text.active().is_some() {
            let owner = Registry::new(&self.config)
                .closest_tagged(&self.tree, el)
                .unwrap_or_else(|| el.clone());
            let element = element_info(&self.tree, &self.config, &owner);
            self.emit(Event::TextElementInfo { element });
        }
    }

    fn on_text_change(&mut self, change: Option<TextChange>) {
        if let Some(change) = change {
            self.emit(Event::TextEdited {
                text_key: change.text_key,
                new_value: change.new_value,
                old_value: change.old_value,
                structure: change.structure,
            });
        }
    }

    fn on_key_down(&mut self, mode: Mode, key: &str) -> Disposition {
        if mode == Mode::Drag && key == "Escape" && self.session.drag.is_dragging() {
            self.session.drag.cancel(&mut self.tree, &self.config);
            return Disposition::PreventDefault;
        }

        if self.session.text.active().is_none() {
            return Disposition::Default;
        }
        match key {
            "Escape" => {
                self.session.text.cancel(&mut self.tree, &self.config);
                Disposition::PreventDefault
            }
            "Enter" => {
                let change = self.session.text.finish(&mut self.tree, &self.config);
                self.on_text_change(change);
                Disposition::PreventDefault
            }
            _ => Disposition::Default,
        }
    }
}

fn parse_path(address: &str) -> OverlayResult<NodePath> {
    Ok(address.parse::<NodePath>()?)
}
