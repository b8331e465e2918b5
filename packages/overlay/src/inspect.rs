//! Element metadata reported to the host

use crate::config::OverlayConfig;
use crate::registry::Registry;
use canopy_dom::RenderTree;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Event attributes scanned for bound interactions
pub const INTERACTION_EVENTS: &[&str] = &[
    "onclick",
    "ondblclick",
    "onmouseover",
    "onmouseout",
    "onmouseenter",
    "onmouseleave",
    "onfocus",
    "onblur",
    "oninput",
    "onchange",
    "onsubmit",
    "onreset",
    "ontoggle",
    "onplay",
    "onpause",
    "onended",
];

/// Properties exposed to the style panel
pub const STYLE_PROPERTIES: &[&str] = &[
    "padding",
    "margin",
    "color",
    "background-color",
    "font-size",
    "font-weight",
    "width",
    "max-width",
    "border-radius",
    "display",
    "gap",
];

const TEXT_SNIPPET_LEN: usize = 100;

static CSS_VAR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\((--[\w-]+)\)").expect("invalid css var regex"));

static QS_CALL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"QS\.(\w+)\([^)]*\)").expect("invalid QS call regex"));

static CALL_TEMPLATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{call:([^}]+)\}\}").expect("invalid call template regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    #[serde(rename = "struct")]
    pub structure: Option<String>,
    pub node: Option<String>,
    pub component: Option<String>,
    pub component_node: Option<String>,
    pub is_component: bool,
    pub tag: String,
    pub id: Option<String>,
    /// Author classes, marker classes removed
    pub classes: Option<String>,
    pub child_count: usize,
    pub text_content: Option<String>,
    pub text_keys: Vec<String>,
    pub has_parent: bool,
    pub has_prev_sibling: bool,
    pub has_next_sibling: bool,
    pub has_children: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleInfo {
    /// Suggested selector: first class, else id, else tag
    pub selector: String,
    pub tag: String,
    pub id: Option<String>,
    pub class_list: Vec<String>,
    pub styles: BTreeMap<String, String>,
    pub css_vars: Vec<String>,
}

pub fn element_info<T: RenderTree>(tree: &T, config: &OverlayConfig, node: &T::Node) -> ElementInfo {
    let registry = Registry::new(config);
    let attrs = &config.attributes;

    let component = tree.attribute(node, &attrs.component);
    let classes = author_classes(tree, config, node);

    let text_content = tree.own_text(node).map(|text| {
        let trimmed = text.trim();
        trimmed.chars().take(TEXT_SNIPPET_LEN).collect::<String>()
    });

    let mut text_keys: Vec<String> = Vec::new();
    let keyed = std::iter::once(node.clone()).chain(tree.descendants(node));
    for n in keyed {
        if let Some(key) = tree.attribute(&n, &attrs.text_key) {
            if !text_keys.contains(&key) {
                text_keys.push(key);
            }
        }
    }

    let has_parent = tree
        .parent(node)
        .and_then(|parent| registry.closest_tagged(tree, &parent))
        .is_some();

    let siblings = registry.tagged_siblings(tree, node);
    let (has_prev_sibling, has_next_sibling) = match siblings.iter().position(|s| s == node) {
        Some(i) => (i > 0, i + 1 < siblings.len()),
        None => (false, false),
    };

    ElementInfo {
        structure: registry.structure_of(tree, node),
        node: tree.attribute(node, &attrs.node),
        is_component: component.is_some(),
        component,
        component_node: tree.attribute(node, &attrs.component_node),
        tag: tree.tag_name(node),
        id: tree.attribute(node, "id").filter(|id| !id.is_empty()),
        classes: if classes.is_empty() {
            None
        } else {
            Some(classes.join(" "))
        },
        child_count: tree.children(node).len(),
        text_content,
        text_keys,
        has_parent,
        has_prev_sibling,
        has_next_sibling,
        has_children: !registry.tagged_within(tree, node).is_empty(),
    }
}

pub fn style_info<T: RenderTree>(tree: &T, config: &OverlayConfig, node: &T::Node) -> StyleInfo {
    let class_list = author_classes(tree, config, node);
    let tag = tree.tag_name(node);
    let id = tree.attribute(node, "id").filter(|id| !id.is_empty());

    let styles = STYLE_PROPERTIES
        .iter()
        .map(|prop| {
            let value = tree.computed_style(node, prop).unwrap_or_default();
            (prop.to_string(), value)
        })
        .collect();

    let inline = tree.attribute(node, "style").unwrap_or_default();
    let css_vars = CSS_VAR_REGEX
        .captures_iter(&inline)
        .map(|caps| caps[1].to_string())
        .collect();

    let selector = match (class_list.first(), id.as_ref()) {
        (Some(class), _) => format!(".{}", class),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => tag.clone(),
    };

    StyleInfo {
        selector,
        tag,
        id,
        class_list,
        styles,
        css_vars,
    }
}

fn author_classes<T: RenderTree>(tree: &T, config: &OverlayConfig, node: &T::Node) -> Vec<String> {
    tree.classes(node)
        .into_iter()
        .filter(|class| !config.is_marker_class(class))
        .collect()
}

fn is_bound_handler(handler: &str) -> bool {
    handler.contains("QS.") || handler.contains("{{call:")
}

/// Whether any event attribute carries a bound interaction
pub fn has_interactions<T: RenderTree>(tree: &T, node: &T::Node) -> bool {
    INTERACTION_EVENTS.iter().any(|event| {
        tree.attribute(node, event)
            .map(|handler| is_bound_handler(&handler))
            .unwrap_or(false)
    })
}

/// One line per bound event, e.g. `onclick: toggle(menu), show(x)`
pub fn interaction_summary<T: RenderTree>(tree: &T, node: &T::Node) -> String {
    let mut lines = Vec::new();
    for event in INTERACTION_EVENTS {
        let Some(handler) = tree.attribute(node, event) else {
            continue;
        };
        if !is_bound_handler(&handler) {
            continue;
        }

        let mut calls: Vec<String> = QS_CALL_REGEX
            .find_iter(&handler)
            .map(|m| m.as_str().trim_start_matches("QS.").to_string())
            .collect();
        for caps in CALL_TEMPLATE_REGEX.captures_iter(&handler) {
            let mut parts = caps[1].split(':');
            let name = parts.next().unwrap_or_default();
            let args: Vec<&str> = parts.collect();
            calls.push(format!("{}({})", name, args.join(",")));
        }

        if !calls.is_empty() {
            lines.push(format!("{}: {}", event, calls.join(", ")));
        }
    }
    lines.join("\n")
}

/// Sorted, unique author classes used anywhere in the document
pub fn page_classes<T: RenderTree>(tree: &T, config: &OverlayConfig) -> Vec<String> {
    let classes: BTreeSet<String> = tree
        .descendants(&tree.document_element())
        .iter()
        .flat_map(|node| tree.classes(node))
        .filter(|class| !config.is_marker_class(class))
        .collect();
    classes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_dom::MemoryDom;

    const PAGE: &str = r#"
        <main data-qs-struct="page" data-qs-node="0">
            <section id="hero" class="hero qs-selected big" data-qs-struct="page" data-qs-node="0.0" data-qs-textkey="hero.title">
                Welcome to the site
                <p data-qs-struct="page" data-qs-node="0.0.0" data-qs-textkey="hero.sub">Sub</p>
                <p data-qs-struct="page" data-qs-node="0.0.1" data-qs-textkey="hero.sub">Again</p>
            </section>
            <div id="plain" data-qs-struct="page" data-qs-node="0.1" style="color: var(--brand); padding: 4px"></div>
            <button id="btn" onclick="QS.toggle(menu); QS.show('x')" onmouseover="{{call:track:hover:btn}}">Go</button>
        </main>
    "#;

    fn node(dom: &MemoryDom, id: &str) -> canopy_dom::NodeId {
        dom.query_selector(&format!("#{}", id)).unwrap().unwrap()
    }

    #[test]
    fn test_element_info() {
        let dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        let info = element_info(&dom, &config, &node(&dom, "hero"));

        assert_eq!(info.structure.as_deref(), Some("page"));
        assert_eq!(info.node.as_deref(), Some("0.0"));
        assert_eq!(info.tag, "section");
        assert_eq!(info.id.as_deref(), Some("hero"));
        assert_eq!(info.classes.as_deref(), Some("hero big"));
        assert_eq!(info.child_count, 2);
        assert_eq!(info.text_content.as_deref(), Some("Welcome to the site"));
        assert_eq!(info.text_keys, vec!["hero.title", "hero.sub"]);
        assert!(info.has_parent);
        assert!(!info.has_prev_sibling);
        assert!(info.has_next_sibling);
        assert!(info.has_children);
        assert!(!info.is_component);
    }

    #[test]
    fn test_element_info_serializes_with_struct_key() {
        let dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        let info = element_info(&dom, &config, &node(&dom, "plain"));
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["struct"], "page");
        assert_eq!(json["node"], "0.1");
        assert_eq!(json["hasPrevSibling"], true);
        assert_eq!(json["classes"], serde_json::Value::Null);
    }

    #[test]
    fn test_style_info() {
        let dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();

        let hero = style_info(&dom, &config, &node(&dom, "hero"));
        assert_eq!(hero.selector, ".hero");
        assert_eq!(hero.class_list, vec!["hero", "big"]);

        let plain = style_info(&dom, &config, &node(&dom, "plain"));
        assert_eq!(plain.selector, "#plain");
        assert_eq!(plain.styles["color"], "var(--brand)");
        assert_eq!(plain.styles["padding"], "4px");
        assert_eq!(plain.styles["margin"], "");
        assert_eq!(plain.css_vars, vec!["--brand"]);
    }

    #[test]
    fn test_interactions() {
        let dom = MemoryDom::from_markup(PAGE).unwrap();
        let btn = node(&dom, "btn");

        assert!(has_interactions(&dom, &btn));
        assert!(!has_interactions(&dom, &node(&dom, "plain")));
        assert_eq!(
            interaction_summary(&dom, &btn),
            "onclick: toggle(menu), show('x')\nonmouseover: track(hover,btn)"
        );
    }

    #[test]
    fn test_page_classes_skip_markers() {
        let dom = MemoryDom::from_markup(PAGE).unwrap();
        let config = OverlayConfig::default();
        assert_eq!(page_classes(&dom, &config), vec!["big", "hero"]);
    }
}
