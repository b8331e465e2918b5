use serde::{Deserialize, Serialize};

/// Overlay configuration. Every field has a default, so `{}` is a valid
/// config and partial JSON only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverlayConfig {
    /// Source tags of the message channel
    pub channel: ChannelConfig,

    /// DOM attribute contract
    pub attributes: AttributeNames,

    /// Prefix of every marker class the overlay adds
    pub class_prefix: String,

    /// Pointer travel in pixels before a pending drag activates
    pub drag_threshold: f64,

    /// Targets shorter than this only offer `before`/`after`
    pub min_inside_height: f64,

    /// Ghost position relative to the pointer
    pub ghost_offset: Offset,

    /// How long the rollback cue class stays on
    pub rollback_cue_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelConfig {
    /// Inbound messages must carry this source
    pub host_source: String,

    /// Outbound messages carry this source
    pub overlay_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeNames {
    pub structure: String,
    pub node: String,
    pub component: String,
    pub component_node: String,
    pub in_component: String,
    pub text_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// Transient marker classes, named without the configured prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Hover,
    Selected,
    Draggable,
    Dragging,
    DragOver,
    DropTargetInside,
    DragShifting,
    DragRollback,
    DragGhost,
    DropIndicator,
    DropInside,
    TextEditable,
    TextEditing,
    Styleable,
    StyleSelected,
    Interactable,
    JsSelected,
    HasInteraction,
    InteractionTooltip,
    SelectorHover,
    SelectorSelected,
}

impl Marker {
    pub fn suffix(&self) -> &'static str {
        match self {
            Marker::Hover => "hover",
            Marker::Selected => "selected",
            Marker::Draggable => "draggable",
            Marker::Dragging => "dragging",
            Marker::DragOver => "drag-over",
            Marker::DropTargetInside => "drop-target-inside",
            Marker::DragShifting => "drag-shifting",
            Marker::DragRollback => "drag-rollback",
            Marker::DragGhost => "drag-ghost",
            Marker::DropIndicator => "drop-indicator",
            Marker::DropInside => "drop-inside",
            Marker::TextEditable => "text-editable",
            Marker::TextEditing => "text-editing",
            Marker::Styleable => "styleable",
            Marker::StyleSelected => "style-selected",
            Marker::Interactable => "interactable",
            Marker::JsSelected => "js-selected",
            Marker::HasInteraction => "has-interaction",
            Marker::InteractionTooltip => "interaction-tooltip",
            Marker::SelectorHover => "selector-hover",
            Marker::SelectorSelected => "selector-selected",
        }
    }
}

impl OverlayConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Full class name of a marker
    pub fn class(&self, marker: Marker) -> String {
        format!("{}{}", self.class_prefix, marker.suffix())
    }

    pub fn is_marker_class(&self, class: &str) -> bool {
        !self.class_prefix.is_empty() && class.starts_with(&self.class_prefix)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            attributes: AttributeNames::default(),
            class_prefix: "qs-".to_string(),
            drag_threshold: 5.0,
            min_inside_height: 30.0,
            ghost_offset: Offset::default(),
            rollback_cue_ms: 300,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host_source: "canopy-host".to_string(),
            overlay_source: "canopy-overlay".to_string(),
        }
    }
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            structure: "data-qs-struct".to_string(),
            node: "data-qs-node".to_string(),
            component: "data-qs-component".to_string(),
            component_node: "data-qs-component-node".to_string(),
            in_component: "data-qs-in-component".to_string(),
            text_key: "data-qs-textkey".to_string(),
        }
    }
}

impl Default for Offset {
    fn default() -> Self {
        Self { x: 12.0, y: -12.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let json = r#"{
            "channel": { "hostSource": "quicksite-admin" },
            "attributes": { "node": "data-path" },
            "dragThreshold": 8
        }"#;

        let config = OverlayConfig::from_json(json).unwrap();
        assert_eq!(config.channel.host_source, "quicksite-admin");
        assert_eq!(config.channel.overlay_source, "canopy-overlay");
        assert_eq!(config.attributes.node, "data-path");
        assert_eq!(config.attributes.structure, "data-qs-struct");
        assert_eq!(config.drag_threshold, 8.0);
        assert_eq!(config.min_inside_height, 30.0);
    }

    #[test]
    fn test_marker_classes() {
        let config = OverlayConfig::default();
        assert_eq!(config.class(Marker::DragRollback), "qs-drag-rollback");
        assert!(config.is_marker_class("qs-hover"));
        assert!(!config.is_marker_class("hero"));
        assert_eq!(config.ghost_offset, Offset { x: 12.0, y: -12.0 });
        assert_eq!(config.rollback_cue_ms, 300);
    }
}
