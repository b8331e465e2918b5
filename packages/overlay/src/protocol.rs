//! # Message Protocol
//!
//! Every message on the channel is a flat JSON object:
//!
//! ```json
//! { "source": "canopy-host", "action": "removeNode", "struct": "page-home", "nodeId": "0.2" }
//! ```
//!
//! Inbound actions deserialize into [`Command`], outbound ones serialize from
//! [`Event`]. Local pointer and keyboard input arrives separately as
//! [`InputEvent`].

use crate::inspect::{ElementInfo, StyleInfo};
use crate::mutations::Position;
use crate::selection::Mode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Host → overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    SetMode {
        mode: Mode,
    },
    ClearSelection,
    /// Mark without notifying
    HighlightNode {
        #[serde(rename = "struct")]
        structure: String,
        node: String,
    },
    SelectNode {
        #[serde(rename = "struct")]
        structure: String,
        node: String,
    },
    InsertNode {
        #[serde(rename = "struct")]
        structure: String,
        target_node: String,
        position: Position,
        html: String,
        new_node_id: String,
    },
    UpdateNode {
        #[serde(rename = "struct")]
        structure: String,
        node_id: String,
        html: String,
    },
    RemoveNode {
        #[serde(rename = "struct")]
        structure: String,
        node_id: String,
    },
    DuplicateNode {
        #[serde(rename = "struct")]
        structure: String,
        source_node_id: String,
        new_node_id: String,
    },
    RollbackDrag,
    ReindexNodes {
        #[serde(rename = "struct")]
        structure: String,
    },
    ShowStruct {
        #[serde(rename = "struct")]
        structure: String,
    },
    HideStruct {
        #[serde(rename = "struct")]
        structure: String,
    },
    ClearStyleSelection,
    ApplyLiveStyle {
        #[serde(rename = "struct")]
        structure: String,
        node_id: String,
        property: String,
        value: String,
    },
    HighlightBySelector {
        selector: String,
    },
    SelectBySelector {
        selector: String,
    },
    ClearSelectorHighlight,
    GetPageClasses,
    NavigateToParent {
        #[serde(rename = "struct")]
        structure: String,
        node: String,
    },
    NavigateToPrevSibling {
        #[serde(rename = "struct")]
        structure: String,
        node: String,
    },
    NavigateToNextSibling {
        #[serde(rename = "struct")]
        structure: String,
        node: String,
    },
    NavigateToFirstChild {
        #[serde(rename = "struct")]
        structure: String,
        node: String,
    },
}

/// Overlay → host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    OverlayReady,
    /// Element metadata flattened into the message
    ElementSelected(ElementInfo),
    DragStarted(ElementInfo),
    ElementMoved {
        source_element: ElementInfo,
        target_element: ElementInfo,
        position: Position,
    },
    InsertNodeFailed {
        error: String,
    },
    UpdateNodeFailed {
        error: String,
    },
    RemoveNodeFailed {
        error: String,
    },
    DuplicateNodeFailed {
        error: String,
    },
    RemoveNodeSuccess {
        node_id: String,
    },
    TextEdited {
        text_key: String,
        new_value: String,
        old_value: String,
        structure: String,
    },
    TextElementInfo {
        element: ElementInfo,
    },
    StyleSelected {
        element: ElementInfo,
        style: StyleInfo,
    },
    InteractionSelected {
        element: ElementInfo,
    },
    PageClassesResult {
        classes: Vec<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetMode { .. } => "setMode",
            Command::ClearSelection => "clearSelection",
            Command::HighlightNode { .. } => "highlightNode",
            Command::SelectNode { .. } => "selectNode",
            Command::InsertNode { .. } => "insertNode",
            Command::UpdateNode { .. } => "updateNode",
            Command::RemoveNode { .. } => "removeNode",
            Command::DuplicateNode { .. } => "duplicateNode",
            Command::RollbackDrag => "rollbackDrag",
            Command::ReindexNodes { .. } => "reindexNodes",
            Command::ShowStruct { .. } => "showStruct",
            Command::HideStruct { .. } => "hideStruct",
            Command::ClearStyleSelection => "clearStyleSelection",
            Command::ApplyLiveStyle { .. } => "applyLiveStyle",
            Command::HighlightBySelector { .. } => "highlightBySelector",
            Command::SelectBySelector { .. } => "selectBySelector",
            Command::ClearSelectorHighlight => "clearSelectorHighlight",
            Command::GetPageClasses => "getPageClasses",
            Command::NavigateToParent { .. } => "navigateToParent",
            Command::NavigateToPrevSibling { .. } => "navigateToPrevSibling",
            Command::NavigateToNextSibling { .. } => "navigateToNextSibling",
            Command::NavigateToFirstChild { .. } => "navigateToFirstChild",
        }
    }
}

impl Event {
    /// Wire form: the event's fields plus the `source` tag
    pub fn to_message(&self, source: &str) -> Value {
        let mut message = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        message.insert("source".to_string(), Value::String(source.to_string()));
        Value::Object(message)
    }

    pub fn action(&self) -> &'static str {
        match self {
            Event::OverlayReady => "overlayReady",
            Event::ElementSelected(_) => "elementSelected",
            Event::DragStarted(_) => "dragStarted",
            Event::ElementMoved { .. } => "elementMoved",
            Event::InsertNodeFailed { .. } => "insertNodeFailed",
            Event::UpdateNodeFailed { .. } => "updateNodeFailed",
            Event::RemoveNodeFailed { .. } => "removeNodeFailed",
            Event::DuplicateNodeFailed { .. } => "duplicateNodeFailed",
            Event::RemoveNodeSuccess { .. } => "removeNodeSuccess",
            Event::TextEdited { .. } => "textEdited",
            Event::TextElementInfo { .. } => "textElementInfo",
            Event::StyleSelected { .. } => "styleSelected",
            Event::InteractionSelected { .. } => "interactionSelected",
            Event::PageClassesResult { .. } => "pageClassesResult",
        }
    }
}

/// Local input, already reduced to what the engine needs
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent<N> {
    PointerDown { target: N, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerOver { target: N, x: f64, y: f64 },
    PointerOut { target: N },
    Click { target: N },
    KeyDown { key: String },
    Blur { target: N },
}

/// Whether the platform's default handling of an input must be suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    PreventDefault,
}

impl Disposition {
    pub fn prevents_default(self) -> bool {
        self == Disposition::PreventDefault
    }

    pub(crate) fn prevent_if(condition: bool) -> Self {
        if condition {
            Disposition::PreventDefault
        } else {
            Disposition::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_insert_command() {
        let command: Command = serde_json::from_value(json!({
            "source": "canopy-host",
            "action": "insertNode",
            "struct": "page-home",
            "targetNode": "0.1",
            "position": "after",
            "html": "<p>x</p>",
            "newNodeId": "0.2"
        }))
        .unwrap();

        assert_eq!(
            command,
            Command::InsertNode {
                structure: "page-home".into(),
                target_node: "0.1".into(),
                position: Position::After,
                html: "<p>x</p>".into(),
                new_node_id: "0.2".into(),
            }
        );
        assert_eq!(command.name(), "insertNode");
    }

    #[test]
    fn test_parse_unit_and_mode_commands() {
        let rollback: Command = serde_json::from_value(json!({"action": "rollbackDrag"})).unwrap();
        assert_eq!(rollback, Command::RollbackDrag);

        let mode: Command = serde_json::from_value(json!({"action": "setMode", "mode": "style"})).unwrap();
        assert_eq!(mode, Command::SetMode { mode: Mode::Style });

        assert!(serde_json::from_value::<Command>(json!({"action": "explode"})).is_err());
    }

    #[test]
    fn test_event_messages() {
        let removed = Event::RemoveNodeSuccess { node_id: "0.3".into() }.to_message("canopy-overlay");
        assert_eq!(removed, json!({"source": "canopy-overlay", "action": "removeNodeSuccess", "nodeId": "0.3"}));

        let edited = Event::TextEdited {
            text_key: "hero.title".into(),
            new_value: "Hi".into(),
            old_value: "Hello".into(),
            structure: "page".into(),
        }
        .to_message("canopy-overlay");
        assert_eq!(edited["textKey"], "hero.title");
        assert_eq!(edited["structure"], "page");

        let ready = Event::OverlayReady;
        assert_eq!(ready.to_message("x"), json!({"source": "x", "action": "overlayReady"}));
        assert_eq!(ready.action(), "overlayReady");
    }
}
