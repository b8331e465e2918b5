//! Host messages and local input handled by the gateway

use canopy_dom::{MemoryDom, NodeId, RenderTree};
use canopy_overlay::{Event, InputEvent, Mode, Overlay, OverlayConfig};
use serde_json::{json, Value};

const PAGE: &str = r#"
<header id="menu" data-qs-struct="menu" data-qs-node="0">
    <a id="home" class="nav-link" data-qs-struct="menu" data-qs-node="0.0">Home</a>
</header>
<main id="page" data-qs-struct="page-home" data-qs-node="0">
    <section id="hero" class="hero" data-qs-struct="page-home" data-qs-node="0.0">
        <h1 id="title" data-qs-struct="page-home" data-qs-node="0.0.0" data-qs-textkey="home.title">Welcome</h1>
        <p id="lead" class="lead" data-qs-struct="page-home" data-qs-node="0.0.1" data-qs-textkey="home.lead">Hello there</p>
    </section>
    <article id="card" data-qs-struct="page-home" data-qs-node="0.1" data-qs-in-component data-qs-component="card" data-qs-component-node="0.1">
        <button id="cta" data-qs-struct="page-home" data-qs-node="0.1.0" data-qs-in-component onclick="QS.toggle(menu)">Go</button>
    </article>
</main>
"#;

fn overlay() -> Overlay<MemoryDom> {
    let mut overlay = Overlay::new(MemoryDom::from_markup(PAGE).unwrap(), OverlayConfig::default());
    overlay.drain_events();
    overlay
}

fn host(mut message: Value) -> Value {
    message["source"] = json!("canopy-host");
    message
}

fn send(overlay: &mut Overlay<MemoryDom>, message: Value) -> Vec<Event> {
    overlay.handle_message(&host(message));
    overlay.drain_events()
}

fn node(dom: &MemoryDom, id: &str) -> NodeId {
    dom.query_selector(&format!("#{}", id)).unwrap().unwrap()
}

fn input(overlay: &mut Overlay<MemoryDom>, event: InputEvent<NodeId>) -> Vec<Event> {
    overlay.handle_input(event);
    overlay.drain_events()
}

fn click(overlay: &mut Overlay<MemoryDom>, id: &str) -> Vec<Event> {
    let target = node(overlay.tree(), id);
    input(overlay, InputEvent::Click { target })
}

fn selected_node(events: &[Event]) -> Option<String> {
    match events {
        [Event::ElementSelected(info)] => info.node.clone(),
        _ => None,
    }
}

#[test]
fn test_ready_message_and_source_filtering() {
    let mut overlay = Overlay::new(MemoryDom::from_markup(PAGE).unwrap(), OverlayConfig::default());
    let messages = overlay.drain_messages();
    assert_eq!(messages, vec![json!({"source": "canopy-overlay", "action": "overlayReady"})]);

    let foreign = json!({"source": "someone-else", "action": "setMode", "mode": "drag"});
    assert!(!overlay.handle_message(&foreign));
    assert_eq!(overlay.session().mode(), Mode::Select);

    assert!(!overlay.handle_message(&host(json!({"action": "launchRockets"}))));
    assert!(!overlay.handle_message(&json!("not an object")));

    assert!(overlay.handle_message(&host(json!({"action": "setMode", "mode": "drag"}))));
    assert_eq!(overlay.session().mode(), Mode::Drag);
}

#[test]
fn test_click_selects_component_root() {
    let mut overlay = overlay();
    let events = click(&mut overlay, "cta");
    assert_eq!(selected_node(&events).as_deref(), Some("0.1"));

    match events.as_slice() {
        [Event::ElementSelected(info)] => {
            assert!(info.is_component);
            assert_eq!(info.component.as_deref(), Some("card"));
        }
        other => panic!("unexpected events: {:?}", other),
    }

    let dom = overlay.tree();
    assert!(dom.has_class(&node(dom, "card"), "qs-selected"));
}

#[test]
fn test_hover_only_in_select_mode() {
    let mut overlay = overlay();
    let lead = node(overlay.tree(), "lead");

    input(&mut overlay, InputEvent::PointerOver { target: lead, x: 0.0, y: 0.0 });
    assert!(overlay.tree().has_class(&lead, "qs-hover"));
    input(&mut overlay, InputEvent::PointerOut { target: lead });
    assert!(!overlay.tree().has_class(&lead, "qs-hover"));

    send(&mut overlay, json!({"action": "setMode", "mode": "style"}));
    input(&mut overlay, InputEvent::PointerOver { target: lead, x: 0.0, y: 0.0 });
    assert!(!overlay.tree().has_class(&lead, "qs-hover"));
}

#[test]
fn test_add_mode_lets_clicks_through() {
    let mut overlay = overlay();
    let home = node(overlay.tree(), "home");
    assert!(overlay
        .handle_input(InputEvent::Click { target: home })
        .prevents_default());

    send(&mut overlay, json!({"action": "setMode", "mode": "add"}));
    assert!(!overlay
        .handle_input(InputEvent::Click { target: home })
        .prevents_default());
    assert!(overlay.drain_events().is_empty());
}

#[test]
fn test_navigation() {
    let mut overlay = overlay();

    let events = send(&mut overlay, json!({"action": "navigateToParent", "struct": "page-home", "node": "0.0.1"}));
    assert_eq!(selected_node(&events).as_deref(), Some("0.0"));

    let events = send(&mut overlay, json!({"action": "navigateToNextSibling", "struct": "page-home", "node": "0.0"}));
    assert_eq!(selected_node(&events).as_deref(), Some("0.1"));

    let events = send(&mut overlay, json!({"action": "navigateToPrevSibling", "struct": "page-home", "node": "0.0.1"}));
    assert_eq!(selected_node(&events).as_deref(), Some("0.0.0"));

    let events = send(&mut overlay, json!({"action": "navigateToFirstChild", "struct": "page-home", "node": "0"}));
    assert_eq!(selected_node(&events).as_deref(), Some("0.0"));

    // Edges go nowhere
    assert!(send(&mut overlay, json!({"action": "navigateToPrevSibling", "struct": "page-home", "node": "0.0"})).is_empty());
    assert!(send(&mut overlay, json!({"action": "navigateToFirstChild", "struct": "page-home", "node": "0.0.0"})).is_empty());
    assert!(send(&mut overlay, json!({"action": "navigateToParent", "struct": "nope", "node": "0"})).is_empty());

    let dom = overlay.tree();
    assert!(dom.has_class(&node(dom, "hero"), "qs-selected"));
    assert_eq!(dom.query_selector_all(".qs-selected").unwrap().len(), 1);
}

#[test]
fn test_highlight_and_select_node() {
    let mut overlay = overlay();

    let events = send(&mut overlay, json!({"action": "highlightNode", "struct": "menu", "node": "0.0"}));
    assert!(events.is_empty());
    assert!(overlay.tree().has_class(&node(overlay.tree(), "home"), "qs-selected"));

    let events = send(&mut overlay, json!({"action": "selectNode", "struct": "page-home", "node": "0.0.0"}));
    assert_eq!(selected_node(&events).as_deref(), Some("0.0.0"));
    let dom = overlay.tree();
    assert!(!dom.has_class(&node(dom, "home"), "qs-selected"));

    send(&mut overlay, json!({"action": "clearSelection"}));
    assert!(overlay.tree().query_selector(".qs-selected").unwrap().is_none());
}

#[test]
fn test_text_edit_flow() {
    let mut overlay = overlay();
    send(&mut overlay, json!({"action": "setMode", "mode": "text"}));
    let title = node(overlay.tree(), "title");
    assert!(overlay.tree().has_class(&title, "qs-text-editable"));

    let events = click(&mut overlay, "title");
    match events.as_slice() {
        [Event::TextElementInfo { element }] => assert_eq!(element.node.as_deref(), Some("0.0.0")),
        other => panic!("unexpected events: {:?}", other),
    }
    assert_eq!(overlay.tree().attribute(&title, "contenteditable").as_deref(), Some("true"));

    // Clicking the element being edited does not restart the edit
    assert!(click(&mut overlay, "title").is_empty());

    overlay.tree_mut().set_text_content(&title, " Welcome home ");
    let events = input(&mut overlay, InputEvent::KeyDown { key: "Enter".to_string() });
    assert_eq!(
        events,
        vec![Event::TextEdited {
            text_key: "home.title".to_string(),
            new_value: "Welcome home".to_string(),
            old_value: "Welcome".to_string(),
            structure: "page-home".to_string(),
        }]
    );
    assert!(!overlay.tree().has_class(&title, "qs-text-editing"));
}

#[test]
fn test_text_edit_escape_and_blur() {
    let mut overlay = overlay();
    send(&mut overlay, json!({"action": "setMode", "mode": "text"}));
    let lead = node(overlay.tree(), "lead");

    click(&mut overlay, "lead");
    overlay.tree_mut().set_text_content(&lead, "oops");
    let events = input(&mut overlay, InputEvent::KeyDown { key: "Escape".to_string() });
    assert!(events.is_empty());
    assert_eq!(overlay.tree().text_content(&lead), "Hello there");

    click(&mut overlay, "lead");
    overlay.tree_mut().set_text_content(&lead, "Hi");
    let events = input(&mut overlay, InputEvent::Blur { target: lead });
    assert!(matches!(events.as_slice(), [Event::TextEdited { new_value, .. }] if new_value == "Hi"));

    // Leaving text mode drops every text marker
    send(&mut overlay, json!({"action": "setMode", "mode": "select"}));
    assert!(overlay.tree().query_selector(".qs-text-editable").unwrap().is_none());
}

#[test]
fn test_style_and_js_clicks() {
    let mut overlay = overlay();
    send(&mut overlay, json!({"action": "setMode", "mode": "style"}));

    let events = click(&mut overlay, "lead");
    match events.as_slice() {
        [Event::StyleSelected { element, style }] => {
            assert_eq!(element.node.as_deref(), Some("0.0.1"));
            assert_eq!(style.selector, ".lead");
        }
        other => panic!("unexpected events: {:?}", other),
    }
    click(&mut overlay, "title");
    assert_eq!(overlay.tree().query_selector_all(".qs-style-selected").unwrap().len(), 1);

    send(&mut overlay, json!({"action": "clearStyleSelection"}));
    assert!(overlay.tree().query_selector(".qs-style-selected").unwrap().is_none());

    send(&mut overlay, json!({"action": "setMode", "mode": "js"}));
    assert!(overlay.tree().query_selector(".qs-styleable").unwrap().is_none());
    assert!(overlay.tree().has_class(&node(overlay.tree(), "cta"), "qs-has-interaction"));

    let events = click(&mut overlay, "cta");
    assert!(matches!(events.as_slice(), [Event::InteractionSelected { element }] if element.node.as_deref() == Some("0.1")));

    let cta = node(overlay.tree(), "cta");
    input(&mut overlay, InputEvent::PointerOver { target: cta, x: 100.0, y: 50.0 });
    let tooltip = overlay.session().tooltip().copied().unwrap();
    assert_eq!(overlay.tree().text_content(&tooltip), "onclick: toggle(menu)");
}

#[test]
fn test_structure_visibility_and_live_style() {
    let mut overlay = overlay();
    send(&mut overlay, json!({"action": "hideStruct", "struct": "menu"}));
    let dom = overlay.tree();
    assert_eq!(dom.style_property(&node(dom, "menu"), "display").as_deref(), Some("none"));
    assert_eq!(dom.style_property(&node(dom, "home"), "display").as_deref(), Some("none"));

    send(&mut overlay, json!({"action": "showStruct", "struct": "menu"}));
    let dom = overlay.tree();
    assert_eq!(dom.style_property(&node(dom, "menu"), "display"), None);

    send(
        &mut overlay,
        json!({"action": "applyLiveStyle", "struct": "page-home", "nodeId": "0.0", "property": "padding", "value": "24px"}),
    );
    let dom = overlay.tree();
    assert_eq!(dom.style_property(&node(dom, "hero"), "padding").as_deref(), Some("24px"));
}

#[test]
fn test_selectors_and_page_classes() {
    let mut overlay = overlay();

    send(&mut overlay, json!({"action": "highlightBySelector", "selector": ".hero, .lead"}));
    assert_eq!(overlay.tree().query_selector_all(".qs-selector-hover").unwrap().len(), 2);

    send(&mut overlay, json!({"action": "selectBySelector", "selector": "a.nav-link"}));
    assert!(overlay.tree().has_class(&node(overlay.tree(), "home"), "qs-selector-selected"));

    // An unparsable selector matches nothing and reports nothing
    assert!(send(&mut overlay, json!({"action": "highlightBySelector", "selector": "div["})).is_empty());
    assert!(overlay.tree().query_selector(".qs-selector-hover").unwrap().is_none());

    send(&mut overlay, json!({"action": "clearSelectorHighlight"}));
    assert!(overlay.tree().query_selector(".qs-selector-selected").unwrap().is_none());

    let events = send(&mut overlay, json!({"action": "getPageClasses"}));
    assert_eq!(
        events,
        vec![Event::PageClassesResult {
            classes: vec!["hero".to_string(), "lead".to_string(), "nav-link".to_string()]
        }]
    );
}
