//! [`RenderTree`] over the live browser document

use canopy_dom::{DomError, DomResult, Rect, RenderTree};
use wasm_bindgen::{JsCast, UnwrapThrowExt};
use web_sys::{
    Document, Element, HtmlElement, HtmlTemplateElement, Node, ScrollBehavior, ScrollIntoViewOptions,
    ScrollLogicalPosition, Window,
};

pub struct WebDom {
    window: Window,
    document: Document,
    root: Element,
}

impl WebDom {
    /// `None` outside a browsing context
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        let root = document.document_element()?;
        Some(Self {
            window,
            document,
            root,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

fn platform(err: wasm_bindgen::JsValue) -> DomError {
    DomError::Platform(format!("{:?}", err))
}

fn html(node: &Element) -> Option<&HtmlElement> {
    node.dyn_ref::<HtmlElement>()
}

fn collect_elements(list: &web_sys::HtmlCollection) -> Vec<Element> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}

impl RenderTree for WebDom {
    type Node = Element;

    fn document_element(&self) -> Element {
        self.root.clone()
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn tag_name(&self, node: &Element) -> String {
        node.tag_name().to_lowercase()
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn children(&self, node: &Element) -> Vec<Element> {
        collect_elements(&node.children())
    }

    fn next_sibling(&self, node: &Element) -> Option<Element> {
        node.next_element_sibling()
    }

    fn descendants(&self, node: &Element) -> Vec<Element> {
        let Ok(list) = node.query_selector_all("*") else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        if let Err(err) = node.set_attribute(name, value) {
            web_sys::console::warn_2(&format!("canopy: cannot set attribute `{}`", name).into(), &err);
        }
    }

    fn remove_attribute(&mut self, node: &Element, name: &str) {
        let _ = node.remove_attribute(name);
    }

    fn classes(&self, node: &Element) -> Vec<String> {
        let list = node.class_list();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn add_class(&mut self, node: &Element, class: &str) {
        let _ = node.class_list().add_1(class);
    }

    fn remove_class(&mut self, node: &Element, class: &str) {
        let _ = node.class_list().remove_1(class);
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn own_text(&self, node: &Element) -> Option<String> {
        let children = node.child_nodes();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .filter(|child| child.node_type() == Node::TEXT_NODE)
            .filter_map(|child| child.text_content())
            .find(|text| !text.trim().is_empty())
    }

    fn insert_before(&mut self, parent: &Element, child: &Element, reference: Option<&Element>) -> DomResult<()> {
        let reference: Option<&Node> = reference.map(|r| r.as_ref());
        parent
            .insert_before(child, reference)
            .map(|_| ())
            .map_err(|err| DomError::hierarchy(format!("{:?}", err)))
    }

    fn replace_child(&mut self, parent: &Element, new_child: &Element, old_child: &Element) -> DomResult<()> {
        parent
            .replace_child(new_child, old_child)
            .map(|_| ())
            .map_err(|err| DomError::hierarchy(format!("{:?}", err)))
    }

    fn detach(&mut self, node: &Element) {
        node.remove();
    }

    fn deep_clone(&mut self, node: &Element) -> Element {
        node.clone_node_with_deep(true)
            .ok()
            .and_then(|copy| copy.dyn_into::<Element>().ok())
            .expect_throw("cloning an element yields an element")
    }

    fn parse_fragment(&mut self, markup: &str) -> DomResult<Vec<Element>> {
        let template = self
            .document
            .create_element("template")
            .map_err(platform)?
            .dyn_into::<HtmlTemplateElement>()
            .map_err(|_| DomError::NotAnElement)?;
        template.set_inner_html(markup);
        Ok(collect_elements(&template.content().children()))
    }

    fn create_element(&mut self, tag: &str) -> Element {
        self.document.create_element(tag).unwrap_throw()
    }

    fn bounding_rect(&self, node: &Element) -> Rect {
        let rect = node.get_bounding_client_rect();
        Rect::new(rect.x(), rect.y(), rect.width(), rect.height())
    }

    fn elements_at_point(&self, x: f64, y: f64) -> Vec<Element> {
        self.document
            .elements_from_point(x as f32, y as f32)
            .iter()
            .filter_map(|value| value.dyn_into::<Element>().ok())
            .collect()
    }

    fn style_property(&self, node: &Element, property: &str) -> Option<String> {
        html(node)?
            .style()
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_style_property(&mut self, node: &Element, property: &str, value: &str) {
        let Some(element) = html(node) else {
            return;
        };
        let style = element.style();
        let _ = if value.is_empty() {
            style.remove_property(property).map(|_| ())
        } else {
            style.set_property(property, value)
        };
    }

    fn computed_style(&self, node: &Element, property: &str) -> Option<String> {
        self.window
            .get_computed_style(node)
            .ok()
            .flatten()?
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn query_selector_all(&self, selector: &str) -> DomResult<Vec<Element>> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|err| DomError::invalid_selector(selector, format!("{:?}", err)))?;
        Ok((0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .collect())
    }

    fn scroll_into_view(&mut self, node: &Element) {
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        node.scroll_into_view_with_scroll_into_view_options(&options);
    }

    fn scroll_offset(&self) -> (f64, f64) {
        (
            self.window.scroll_x().unwrap_or(0.0),
            self.window.scroll_y().unwrap_or(0.0),
        )
    }
}
