//! Reference renderer.
//!
//! Produces plain [`RenderedNode`] trees: serializable, printable as HTML and
//! able to fire the listeners they carry. Registered components are host
//! functions; inline definitions (`{"tag": .., "slotProps": {slot: props}}`)
//! render as their tag and invoke their scoped slots with the given props.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::payload::{Listener, Payload};
use crate::renderer::{Children, Renderer, ResolvedComponent};
use crate::value::{Map, Value};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// DOM properties that do not reflect to markup.
const UNREFLECTED_DOM_PROPS: &[&str] = &["value", "checked", "selected", "innerHTML", "textContent"];

const DEFAULT_INLINE_TAG: &str = "div";

/// What a registered component function receives.
pub struct ComponentCall<'a> {
    pub name: &'a str,
    pub payload: Payload<RenderedNode>,
    pub children: Children<RenderedNode>,
}

pub type ComponentFn = Rc<dyn Fn(ComponentCall<'_>) -> Result<RenderedNode>>;

pub fn component(f: impl Fn(ComponentCall<'_>) -> Result<RenderedNode> + 'static) -> ComponentFn {
    Rc::new(f)
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNode {
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "ref")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub class: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub style: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub props: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub dom_props: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(skip)]
    listeners: IndexMap<String, Vec<Listener>>,
}

impl RenderedNode {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<RenderedNode>) -> Self {
        self.children = children;
        self
    }

    pub fn add_listener(&mut self, event: &str, listener: Listener) {
        if !self.events.iter().any(|e| e == event) {
            self.events.push(event.to_string());
        }
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Fires every listener registered for `event`, in registration order.
    /// Returns the last listener's result, `null` when none is registered.
    pub fn trigger(&self, event: &str, args: &[Value]) -> Result<Value> {
        let mut result = Value::Null;
        for listener in self.listeners.get(event).into_iter().flatten() {
            result = listener.call(args)?;
        }
        Ok(result)
    }

    /// First node with `tag`, pre-order, including `self`.
    pub fn find(&self, tag: &str) -> Option<&RenderedNode> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(tag))
    }

    pub fn find_all(&self, tag: &str) -> Vec<&RenderedNode> {
        let mut found = Vec::new();
        self.collect(tag, &mut found);
        found
    }

    fn collect<'a>(&'a self, tag: &str, found: &mut Vec<&'a RenderedNode>) {
        if self.tag == tag {
            found.push(self);
        }
        for child in &self.children {
            child.collect(tag, found);
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);

        if !self.class.is_empty() {
            push_attr(out, "class", &self.class.join(" "));
        }
        if !self.style.is_empty() {
            let style = self
                .style
                .iter()
                .map(|(name, value)| format!("{}: {};", name, value.to_text()))
                .collect::<Vec<_>>()
                .join(" ");
            push_attr(out, "style", &style);
        }
        let reflected = self
            .dom_props
            .iter()
            .filter(|(name, _)| !UNREFLECTED_DOM_PROPS.contains(&name.as_str()));
        for (name, value) in self.attrs.iter().chain(reflected) {
            match value {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) => push_attr(out, name, name),
                other => push_attr(out, name, &other.to_text()),
            }
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }
        if let Some(html) = &self.html {
            out.push_str(html);
        } else if let Some(text) = &self.text {
            out.push_str(&escape_text(text));
        } else {
            for child in &self.children {
                child.write_html(out);
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
    out.push('"');
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TreeRenderer;

impl TreeRenderer {
    /// Plain element for `tag` carrying everything in `payload` except its
    /// scoped slots.
    pub fn element(
        tag: &str,
        payload: Payload<RenderedNode>,
        children: Children<RenderedNode>,
    ) -> RenderedNode {
        let mut node = RenderedNode::element(tag);
        node.class = payload.active_classes().map(str::to_string).collect();
        node.key = payload.key;
        node.reference = payload.reference;
        node.style = payload.style;
        node.attrs = payload.attrs;
        node.props = payload.props;
        node.dom_props = payload.dom_props;
        for (event, listener) in payload.on.into_iter().chain(payload.native_on) {
            node.add_listener(&event, listener);
        }

        match children {
            Children::None => {
                if let Some(html) = node.dom_props.get("innerHTML") {
                    node.html = Some(html.to_text());
                } else if let Some(text) = node.dom_props.get("textContent") {
                    node.text = Some(text.to_text());
                }
            }
            Children::Text(text) => node.text = Some(text),
            Children::Html(html) => node.html = Some(html),
            Children::Nodes(nodes) => node.children = nodes,
        }
        node
    }

    fn inline(
        definition: &Value,
        payload: Payload<RenderedNode>,
        children: Children<RenderedNode>,
    ) -> Result<RenderedNode> {
        let tag = definition
            .member("tag")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_INLINE_TAG);
        let slot_props = definition.member("slotProps");

        let mut slotted = Vec::new();
        for (name, factory) in &payload.scoped_slots {
            let props = slot_props
                .and_then(|props| props.member(name))
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            slotted.extend(factory.invoke(props)?);
        }

        let children = match children {
            Children::Nodes(mut nodes) => {
                nodes.extend(slotted);
                Children::Nodes(nodes)
            }
            _ if !slotted.is_empty() => Children::Nodes(slotted),
            other => other,
        };
        Ok(Self::element(tag, payload, children))
    }
}

impl Renderer for TreeRenderer {
    type Node = RenderedNode;
    type Component = ComponentFn;

    fn create_node(
        &self,
        component: &ResolvedComponent<ComponentFn>,
        mut payload: Payload<RenderedNode>,
        children: Children<RenderedNode>,
    ) -> Result<RenderedNode> {
        match component {
            ResolvedComponent::Tag(tag) => Ok(Self::element(tag, payload, children)),
            ResolvedComponent::Inline(definition) => Self::inline(definition, payload, children),
            ResolvedComponent::Registered { name, component } => {
                // Native listeners bind to the component's root element.
                let native = std::mem::take(&mut payload.native_on);
                let mut root = component(ComponentCall {
                    name,
                    payload,
                    children,
                })?;
                for (event, listener) in native {
                    root.add_listener(&event, listener);
                }
                Ok(root)
            }
        }
    }
}
