//! Per-document interaction state.
//!
//! One [`Session`] lives inside the gateway and is the only place the
//! overlay keeps state between messages. Everything else is re-read from the
//! render tree on demand.

use crate::config::{Marker, OverlayConfig};
use crate::drag::DragMachine;
use crate::errors::OverlayResult;
use crate::inspect::has_interactions;
use crate::registry::Registry;
use crate::selection::{strip_marker, Mode, SelectionTracker};
use crate::text_edit::TextEditor;
use canopy_dom::RenderTree;
use tracing::{debug, info, warn};

/// Tooltip offset from the pointer, in pixels
const TOOLTIP_OFFSET: f64 = 15.0;

#[derive(Debug)]
pub struct Session<N> {
    mode: Mode,
    pub(crate) selection: SelectionTracker<N>,
    pub(crate) drag: DragMachine<N>,
    pub(crate) text: TextEditor<N>,
    selector_hovered: Vec<N>,
    selector_selected: Vec<N>,
    tooltip: Option<N>,
}

impl<N> Default for Session<N> {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            selection: SelectionTracker::default(),
            drag: DragMachine::default(),
            text: TextEditor::default(),
            selector_hovered: Vec::new(),
            selector_selected: Vec::new(),
            tooltip: None,
        }
    }
}

impl<N: Clone + PartialEq + std::fmt::Debug> Session<N> {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selection(&self) -> &SelectionTracker<N> {
        &self.selection
    }

    pub fn drag(&self) -> &DragMachine<N> {
        &self.drag
    }

    pub fn text(&self) -> &TextEditor<N> {
        &self.text
    }

    pub fn tooltip(&self) -> Option<&N> {
        self.tooltip.as_ref()
    }

    pub fn selector_matches(&self) -> (&[N], &[N]) {
        (&self.selector_hovered, &self.selector_selected)
    }

    /// Leave the current mode, then enter `mode`. Hover is always dropped;
    /// the selection only survives modes that reuse it.
    pub fn set_mode<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, mode: Mode) {
        self.leave_mode(tree, config);

        let previous = std::mem::replace(&mut self.mode, mode);
        self.selection.clear_hover(tree, config);
        if !mode.preserves_selection() {
            self.selection.clear_selection(tree, config);
        }

        self.enter_mode(tree, config);
        info!(from = %previous, to = %mode, "Mode changed");
    }

    fn enter_mode<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        let registry = Registry::new(config);
        match self.mode {
            Mode::Drag => self.drag.enable(tree, config),
            Mode::Text => {
                let editable = config.class(Marker::TextEditable);
                for node in tree.descendants(&tree.document_element()) {
                    if tree.has_attribute(&node, &config.attributes.text_key) {
                        tree.add_class(&node, &editable);
                    }
                }
            }
            Mode::Style => {
                let styleable = config.class(Marker::Styleable);
                for node in registry.tagged_within(tree, &tree.document_element()) {
                    tree.add_class(&node, &styleable);
                }
            }
            Mode::Js => {
                let interactable = config.class(Marker::Interactable);
                let bound = config.class(Marker::HasInteraction);
                for node in registry.tagged_within(tree, &tree.document_element()) {
                    tree.add_class(&node, &interactable);
                    if has_interactions(tree, &node) {
                        tree.add_class(&node, &bound);
                    }
                }
            }
            Mode::Select | Mode::Add => {}
        }
    }

    fn leave_mode<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        match self.mode {
            Mode::Drag => self.drag.disable(tree, config),
            Mode::Text => {
                self.text.cancel(tree, config);
                strip_marker(tree, &config.class(Marker::TextEditable));
                strip_marker(tree, &config.class(Marker::TextEditing));
            }
            Mode::Style => {
                strip_marker(tree, &config.class(Marker::Styleable));
                strip_marker(tree, &config.class(Marker::StyleSelected));
            }
            Mode::Js => {
                strip_marker(tree, &config.class(Marker::Interactable));
                strip_marker(tree, &config.class(Marker::JsSelected));
                strip_marker(tree, &config.class(Marker::HasInteraction));
                self.hide_tooltip(tree);
            }
            Mode::Select | Mode::Add => {}
        }
    }

    /// Show `summary` next to the pointer, creating the tooltip on first use
    pub fn show_tooltip<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        summary: &str,
        x: f64,
        y: f64,
    ) {
        let tooltip = match &self.tooltip {
            Some(tooltip) => tooltip.clone(),
            None => {
                let tooltip = tree.create_element("div");
                tree.add_class(&tooltip, &config.class(Marker::InteractionTooltip));
                if let Some(body) = tree.body() {
                    if let Err(e) = tree.append_child(&body, &tooltip) {
                        warn!(error = %e, "Could not attach interaction tooltip");
                    }
                }
                self.tooltip = Some(tooltip.clone());
                tooltip
            }
        };

        tree.set_text_content(&tooltip, summary);
        tree.set_style_property(&tooltip, "display", "block");
        tree.set_style_property(&tooltip, "left", &format!("{}px", x + TOOLTIP_OFFSET));
        tree.set_style_property(&tooltip, "top", &format!("{}px", y + TOOLTIP_OFFSET));
    }

    pub fn hide_tooltip<T: RenderTree<Node = N>>(&mut self, tree: &mut T) {
        if let Some(tooltip) = &self.tooltip {
            tree.set_style_property(tooltip, "display", "none");
        }
    }

    /// Mark every match of `selector`, replacing the previous set of the same
    /// kind. Returns the number of elements marked.
    pub fn highlight_selector<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        selector: &str,
        select: bool,
    ) -> OverlayResult<usize> {
        let marker = if select {
            Marker::SelectorSelected
        } else {
            Marker::SelectorHover
        };
        self.clear_selector_marks(tree, config, marker);

        let registry = Registry::new(config);
        let matches: Vec<N> = tree
            .query_selector_all(selector)?
            .into_iter()
            .filter(|node| !registry.is_ignored(tree, node))
            .collect();

        let class = config.class(marker);
        for node in &matches {
            tree.add_class(node, &class);
        }
        if select {
            if let Some(first) = matches.first() {
                tree.scroll_into_view(first);
            }
        }

        debug!(%selector, matches = matches.len(), select, "Selector highlighted");
        let count = matches.len();
        if select {
            self.selector_selected = matches;
        } else {
            self.selector_hovered = matches;
        }
        Ok(count)
    }

    pub fn clear_selector_highlight<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) {
        self.clear_selector_marks(tree, config, Marker::SelectorHover);
        self.clear_selector_marks(tree, config, Marker::SelectorSelected);
    }

    fn clear_selector_marks<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig, marker: Marker) {
        let marked = match marker {
            Marker::SelectorSelected => std::mem::take(&mut self.selector_selected),
            _ => std::mem::take(&mut self.selector_hovered),
        };
        let class = config.class(marker);
        for node in marked {
            tree.remove_class(&node, &class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_dom::MemoryDom;

    const PAGE: &str = r#"<main data-qs-struct="page" data-qs-node="0">
        <p id="a" class="lead" data-qs-struct="page" data-qs-node="0.0" data-qs-textkey="a.text">A</p>
        <button id="b" data-qs-struct="page" data-qs-node="0.1" onclick="QS.toggle(menu)">B</button>
        <script class="lead"></script>
    </main>"#;

    fn by_id(dom: &MemoryDom, id: &str) -> canopy_dom::NodeId {
        dom.query_selector(&format!("#{}", id)).unwrap().unwrap()
    }

    #[test]
    fn test_mode_switch_clears_markers() {
        let mut dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        let mut session = Session::default();
        let (a, b) = (by_id(&dom, "a"), by_id(&dom, "b"));

        session.set_mode(&mut dom, &config, Mode::Js);
        assert!(dom.has_class(&a, "qs-interactable"));
        assert!(!dom.has_class(&a, "qs-has-interaction"));
        assert!(dom.has_class(&b, "qs-has-interaction"));

        session.set_mode(&mut dom, &config, Mode::Text);
        assert!(!dom.has_class(&b, "qs-interactable"));
        assert!(dom.has_class(&a, "qs-text-editable"));
        assert!(!dom.has_class(&b, "qs-text-editable"));

        session.set_mode(&mut dom, &config, Mode::Select);
        assert!(!dom.has_class(&a, "qs-text-editable"));
        assert_eq!(session.mode(), Mode::Select);
    }

    #[test]
    fn test_selection_survives_style_but_not_drag() {
        let mut dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        let mut session = Session::default();
        let a = by_id(&dom, "a");

        session.selection.select(&mut dom, &config, &a);
        session.set_mode(&mut dom, &config, Mode::Style);
        assert_eq!(session.selection().selected(), Some(&a));

        session.set_mode(&mut dom, &config, Mode::Drag);
        assert_eq!(session.selection().selected(), None);
        assert!(!dom.has_class(&a, "qs-selected"));
        assert!(dom.has_class(&a, "qs-draggable"));
        assert!(session.drag().indicator().is_some());
    }

    #[test]
    fn test_selector_highlight_skips_ignored_tags() {
        let mut dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        let mut session = Session::default();

        assert_eq!(session.highlight_selector(&mut dom, &config, ".lead", false).unwrap(), 1);
        assert!(dom.has_class(&by_id(&dom, "a"), "qs-selector-hover"));

        assert!(session.highlight_selector(&mut dom, &config, "p[", true).is_err());
        session.clear_selector_highlight(&mut dom, &config);
        assert!(!dom.has_class(&by_id(&dom, "a"), "qs-selector-hover"));
    }

    #[test]
    fn test_tooltip_is_reused() {
        let mut dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        let mut session = Session::default();

        session.show_tooltip(&mut dom, &config, "onclick: toggle(menu)", 10.0, 20.0);
        let tooltip = session.tooltip().cloned().unwrap();
        assert_eq!(dom.style_property(&tooltip, "left").as_deref(), Some("25px"));
        assert_eq!(dom.style_property(&tooltip, "top").as_deref(), Some("35px"));

        session.show_tooltip(&mut dom, &config, "other", 0.0, 0.0);
        assert_eq!(session.tooltip(), Some(&tooltip));
        assert_eq!(dom.text_content(&tooltip), "other");

        session.hide_tooltip(&mut dom);
        assert_eq!(dom.style_property(&tooltip, "display").as_deref(), Some("none"));
    }
}
