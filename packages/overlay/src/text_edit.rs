//! Inline editing of text-bound elements

use crate::config::{Marker, OverlayConfig};
use crate::registry::Registry;
use canopy_dom::RenderTree;
use tracing::{debug, info};

/// An edit in progress
#[derive(Debug, Clone, PartialEq)]
pub struct TextEdit<N> {
    pub element: N,
    pub text_key: String,
    /// Text as it was when the edit started
    pub original: String,
}

/// A committed edit whose text actually changed
#[derive(Debug, Clone, PartialEq)]
pub struct TextChange {
    pub text_key: String,
    pub new_value: String,
    pub old_value: String,
    pub structure: String,
}

#[derive(Debug)]
pub struct TextEditor<N> {
    active: Option<TextEdit<N>>,
}

impl<N> Default for TextEditor<N> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<N: Clone + PartialEq> TextEditor<N> {
    pub fn active(&self) -> Option<&TextEdit<N>> {
        self.active.as_ref()
    }

    pub fn is_editing(&self, node: &N) -> bool {
        self.active.as_ref().map(|edit| &edit.element) == Some(node)
    }

    /// Open `element` for editing, committing any edit already in progress.
    /// Returns the change committed by that earlier edit.
    pub fn start<T: RenderTree<Node = N>>(
        &mut self,
        tree: &mut T,
        config: &OverlayConfig,
        element: &N,
    ) -> Option<TextChange> {
        let previous = self.finish(tree, config);

        let Some(text_key) = tree.attribute(element, &config.attributes.text_key) else {
            debug!("Element has no text binding");
            return previous;
        };

        let original = tree.text_content(element);
        tree.add_class(element, &config.class(Marker::TextEditing));
        tree.set_attribute(element, "contenteditable", "true");

        debug!(%text_key, "Text edit started");
        self.active = Some(TextEdit {
            element: element.clone(),
            text_key,
            original,
        });
        previous
    }

    /// Close the current edit, reporting the change if the trimmed text differs
    pub fn finish<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) -> Option<TextChange> {
        let edit = self.active.take()?;
        close(tree, config, &edit.element);

        let new_value = collapse_newlines(&tree.text_content(&edit.element)).trim().to_string();
        if new_value == edit.original.trim() {
            debug!(text_key = %edit.text_key, "Text unchanged");
            return None;
        }

        let structure = Registry::new(config)
            .structure_of(tree, &edit.element)
            .unwrap_or_default();
        info!(text_key = %edit.text_key, %structure, "Text edited");
        Some(TextChange {
            text_key: edit.text_key,
            new_value,
            old_value: edit.original,
            structure,
        })
    }

    /// Close the current edit and restore its original text.
    /// Returns whether an edit was open.
    pub fn cancel<T: RenderTree<Node = N>>(&mut self, tree: &mut T, config: &OverlayConfig) -> bool {
        let Some(edit) = self.active.take() else {
            return false;
        };
        tree.set_text_content(&edit.element, &edit.original);
        close(tree, config, &edit.element);
        debug!(text_key = %edit.text_key, "Text edit cancelled");
        true
    }
}

fn close<T: RenderTree>(tree: &mut T, config: &OverlayConfig, element: &T::Node) {
    tree.remove_class(element, &config.class(Marker::TextEditing));
    tree.set_attribute(element, "contenteditable", "false");
}

fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}
