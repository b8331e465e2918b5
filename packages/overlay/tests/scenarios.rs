//! End-to-end mutation scenarios driven through host messages

use canopy_dom::{MemoryDom, NodeId, RenderTree};
use canopy_overlay::{Event, Overlay, OverlayConfig};
use serde_json::{json, Value};

const LIST: &str = r#"
<ul id="list" data-qs-struct="page-home" data-qs-node="0">
    <li id="a" data-qs-struct="page-home" data-qs-node="0.0">A</li>
    <li id="b" data-qs-struct="page-home" data-qs-node="0.1"><span id="b-inner" data-qs-struct="page-home" data-qs-node="0.1.0">B</span></li>
    <li id="c" data-qs-struct="page-home" data-qs-node="0.2">C</li>
</ul>
"#;

fn overlay() -> Overlay<MemoryDom> {
    let dom = MemoryDom::from_markup(LIST).unwrap();
    let mut overlay = Overlay::new(dom, OverlayConfig::default());
    assert_eq!(overlay.drain_events(), vec![Event::OverlayReady]);
    overlay
}

fn send(overlay: &mut Overlay<MemoryDom>, mut message: Value) -> Vec<Event> {
    message["source"] = json!("canopy-host");
    assert!(overlay.handle_message(&message), "message was not handled: {message}");
    overlay.drain_events()
}

fn node(dom: &MemoryDom, id: &str) -> NodeId {
    dom.query_selector(&format!("#{}", id)).unwrap().unwrap()
}

/// `(text, address)` of each list item in DOM order
fn items(dom: &MemoryDom) -> Vec<(String, String)> {
    dom.children(&node(dom, "list"))
        .iter()
        .map(|li| {
            (
                dom.text_content(li).trim().to_string(),
                dom.attribute(li, "data-qs-node").unwrap(),
            )
        })
        .collect()
}

fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(text, address)| (text.to_string(), address.to_string()))
        .collect()
}

#[test]
fn test_insert_into_middle_of_list() {
    let mut overlay = overlay();
    let events = send(
        &mut overlay,
        json!({
            "action": "insertNode",
            "struct": "page-home",
            "targetNode": "0.0",
            "position": "after",
            "html": "<li>new</li>",
            "newNodeId": "0.1"
        }),
    );

    let dom = overlay.tree();
    assert_eq!(
        items(dom),
        pairs(&[("A", "0.0"), ("new", "0.1"), ("B", "0.2"), ("C", "0.3")])
    );
    assert_eq!(
        dom.attribute(&node(dom, "b-inner"), "data-qs-node").as_deref(),
        Some("0.2.0")
    );

    match events.as_slice() {
        [Event::ElementSelected(info)] => {
            assert_eq!(info.node.as_deref(), Some("0.1"));
            assert_eq!(info.tag, "li");
        }
        other => panic!("unexpected events: {:?}", other),
    }

    let inserted = dom.children(&node(dom, "list"))[1];
    assert!(dom.has_class(&inserted, "qs-selected"));

    println!("✓ Insert opens the slot and shifts later siblings");
}

#[test]
fn test_remove_from_middle_of_list() {
    let mut overlay = overlay();
    let events = send(
        &mut overlay,
        json!({"action": "removeNode", "struct": "page-home", "nodeId": "0.1"}),
    );

    assert_eq!(items(overlay.tree()), pairs(&[("A", "0.0"), ("C", "0.1")]));
    assert_eq!(
        events,
        vec![Event::RemoveNodeSuccess {
            node_id: "0.1".to_string()
        }]
    );

    println!("✓ Remove closes the slot");
}

#[test]
fn test_insert_then_remove_restores_addresses() {
    let mut overlay = overlay();
    let before = items(overlay.tree());

    send(
        &mut overlay,
        json!({
            "action": "insertNode",
            "struct": "page-home",
            "targetNode": "0.1",
            "position": "before",
            "html": "<li>tmp</li>",
            "newNodeId": "0.1"
        }),
    );
    send(
        &mut overlay,
        json!({"action": "removeNode", "struct": "page-home", "nodeId": "0.1"}),
    );

    assert_eq!(items(overlay.tree()), before);
    let dom = overlay.tree();
    assert_eq!(
        dom.attribute(&node(dom, "b-inner"), "data-qs-node").as_deref(),
        Some("0.1.0")
    );
}

#[test]
fn test_duplicate_and_update() {
    let mut overlay = overlay();
    send(
        &mut overlay,
        json!({"action": "duplicateNode", "struct": "page-home", "sourceNodeId": "0.1", "newNodeId": "0.2"}),
    );

    assert_eq!(
        items(overlay.tree()),
        pairs(&[("A", "0.0"), ("B", "0.1"), ("B", "0.2"), ("C", "0.3")])
    );

    let events = send(
        &mut overlay,
        json!({"action": "updateNode", "struct": "page-home", "nodeId": "0.2", "html": "<li>copy</li>"}),
    );
    assert!(matches!(events.as_slice(), [Event::ElementSelected(_)]));
    assert_eq!(
        items(overlay.tree()),
        pairs(&[("A", "0.0"), ("B", "0.1"), ("copy", "0.2"), ("C", "0.3")])
    );
}

#[test]
fn test_failures_are_reported_without_mutation() {
    let mut overlay = overlay();
    let before = items(overlay.tree());

    let events = send(
        &mut overlay,
        json!({
            "action": "insertNode",
            "struct": "page-home",
            "targetNode": "0.9",
            "position": "after",
            "html": "<li>x</li>",
            "newNodeId": "0.10"
        }),
    );
    match events.as_slice() {
        [Event::InsertNodeFailed { error }] => assert!(error.contains("Target element not found")),
        other => panic!("unexpected events: {:?}", other),
    }

    let events = send(
        &mut overlay,
        json!({"action": "updateNode", "struct": "page-home", "nodeId": "0.1", "html": "no markup"}),
    );
    match events.as_slice() {
        [Event::UpdateNodeFailed { error }] => assert!(error.contains("Invalid HTML")),
        other => panic!("unexpected events: {:?}", other),
    }

    let events = send(
        &mut overlay,
        json!({"action": "removeNode", "struct": "page-home", "nodeId": "0.x"}),
    );
    assert!(matches!(events.as_slice(), [Event::RemoveNodeFailed { .. }]));

    let events = send(
        &mut overlay,
        json!({"action": "duplicateNode", "struct": "missing", "sourceNodeId": "0", "newNodeId": "1"}),
    );
    assert!(matches!(events.as_slice(), [Event::DuplicateNodeFailed { .. }]));

    assert_eq!(items(overlay.tree()), before);
}

#[test]
fn test_reindex_repairs_manual_moves() {
    let mut overlay = overlay();
    {
        let dom = overlay.tree_mut();
        let list = node(dom, "list");
        let a = node(dom, "a");
        dom.append_child(&list, &a).unwrap();
    }

    send(&mut overlay, json!({"action": "reindexNodes", "struct": "page-home"}));
    assert_eq!(
        items(overlay.tree()),
        pairs(&[("B", "0.0"), ("C", "0.1"), ("A", "0.2")])
    );
}
