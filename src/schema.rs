//! Schema nodes, normalized at load time.
//!
//! Every `:`-marked key is classified into a [`Bindable`] here, once. The
//! builder never looks at raw key prefixes.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value as Json;
use tracing::trace;

use crate::binding::{split_marker, Bindable};
use crate::error::{Error, Result};
use crate::value::{Callable, Map, Value};

const KNOWN_KEYS: &[&str] = &[
    "component",
    "namespace",
    "data",
    "if",
    "show",
    "class",
    "style",
    "attrs",
    "props",
    "domProps",
    "text",
    "html",
    "children",
    "for",
    "key",
    "on",
    "nativeOn",
    "scopedSlots",
    "slot",
    "ref",
    "refInFor",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ComponentSpec {
    /// Registry name or intrinsic tag.
    Name(String),
    /// Inline component definition, handed to the renderer as is.
    Inline(Value),
}

impl From<&str> for ComponentSpec {
    fn from(name: &str) -> Self {
        ComponentSpec::Name(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Handler {
    /// Host callback embedded in a programmatic schema.
    Callback(Callable),
    Binding(Bindable),
}

/// Static and bound form of a boolean directive (`if`, `show`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Toggle {
    pub literal: Option<bool>,
    pub bound: Option<Bindable>,
}

/// Per-key entries of `style`/`attrs`/`props`/`domProps`, in declaration
/// order, plus an optional top-level bound object merged over them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindableMap {
    pub entries: IndexMap<String, Bindable>,
    pub spread: Option<Bindable>,
}

impl BindableMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.spread.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub component: ComponentSpec,
    pub namespace: Option<String>,
    pub data: Option<Map>,
    pub condition: Toggle,
    pub show: Toggle,
    pub class: Option<Value>,
    pub bound_class: Option<Bindable>,
    pub style: BindableMap,
    pub attrs: BindableMap,
    pub props: BindableMap,
    pub dom_props: BindableMap,
    pub text: Option<String>,
    pub bound_text: Option<Bindable>,
    pub html: Option<Bindable>,
    pub children: Option<Vec<SchemaNode>>,
    pub repeat: Option<Bindable>,
    pub key: Option<Bindable>,
    pub on: IndexMap<String, Handler>,
    pub native_on: IndexMap<String, Handler>,
    pub scoped_slots: IndexMap<String, Rc<SchemaNode>>,
    pub slot: Option<String>,
    pub reference: Option<String>,
    pub ref_in_for: bool,
}

impl SchemaNode {
    pub fn new(component: impl Into<ComponentSpec>) -> Self {
        Self {
            component: component.into(),
            namespace: None,
            data: None,
            condition: Toggle::default(),
            show: Toggle::default(),
            class: None,
            bound_class: None,
            style: BindableMap::default(),
            attrs: BindableMap::default(),
            props: BindableMap::default(),
            dom_props: BindableMap::default(),
            text: None,
            bound_text: None,
            html: None,
            children: None,
            repeat: None,
            key: None,
            on: IndexMap::new(),
            native_on: IndexMap::new(),
            scoped_slots: IndexMap::new(),
            slot: None,
            reference: None,
            ref_in_for: false,
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_listener(mut self, event: &str, callback: Callable) -> Self {
        self.on.insert(event.to_string(), Handler::Callback(callback));
        self
    }

    pub fn with_native_listener(mut self, event: &str, callback: Callable) -> Self {
        self.native_on
            .insert(event.to_string(), Handler::Callback(callback));
        self
    }

    pub fn parse(json: &str) -> Result<Self> {
        let parsed: Json = serde_json::from_str(json)?;
        Self::from_json(&parsed)
    }

    pub fn from_json(json: &Json) -> Result<Self> {
        let node = load_node(json)?;
        node.validate()?;
        Ok(node)
    }

    /// Structural checks the builder relies on. Runs over the whole tree.
    pub fn validate(&self) -> Result<()> {
        let label = self.label();
        if self.namespace.is_none() {
            if self.repeat.is_some() {
                return Err(Error::invalid_schema(format!(
                    "`{}` carries `for` but declares no namespace",
                    label
                )));
            }
            if !self.scoped_slots.is_empty() {
                return Err(Error::invalid_schema(format!(
                    "`{}` declares scoped slots but no namespace",
                    label
                )));
            }
            if self.data.is_some() {
                return Err(Error::invalid_schema(format!(
                    "`{}` declares data but no namespace",
                    label
                )));
            }
        }

        for child in self.children.iter().flatten() {
            child.validate()?;
        }
        for (name, content) in &self.scoped_slots {
            if content.repeat.is_some() {
                return Err(Error::invalid_schema(format!(
                    "content of scoped slot `{}` cannot carry `for`",
                    name
                )));
            }
            content.validate()?;
        }
        Ok(())
    }

    fn label(&self) -> String {
        match &self.component {
            ComponentSpec::Name(name) => name.clone(),
            ComponentSpec::Inline(_) => "inline component".to_string(),
        }
    }
}

fn string_field(key: &str, value: &Json) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_schema(format!("`{}` must be a string", key)))
}

fn load_node(json: &Json) -> Result<SchemaNode> {
    let object = json
        .as_object()
        .ok_or_else(|| Error::invalid_schema("schema node must be an object"))?;

    let component = match object.get("component") {
        Some(Json::String(name)) => ComponentSpec::Name(name.clone()),
        Some(def @ Json::Object(_)) => ComponentSpec::Inline(Value::from(def)),
        Some(_) => {
            return Err(Error::invalid_schema(
                "`component` must be a name or an inline definition",
            ))
        }
        None => return Err(Error::invalid_schema("schema node is missing `component`")),
    };
    let mut node = SchemaNode::new(component);

    for (raw_key, value) in object {
        let (key, bound) = split_marker(raw_key);
        match (key, bound) {
            ("component", false) => {}
            ("namespace", false) => node.namespace = Some(string_field(key, value)?),
            ("data", false) => match Value::from(value) {
                Value::Object(map) => node.data = Some(map),
                _ => return Err(Error::invalid_schema("`data` must be an object")),
            },
            ("if", false) => node.condition.literal = Some(Value::from(value).truthy()),
            ("if", true) => node.condition.bound = Some(Bindable::bound(value)?),
            ("show", false) => node.show.literal = Some(Value::from(value).truthy()),
            ("show", true) => node.show.bound = Some(Bindable::bound(value)?),
            ("class", false) => node.class = Some(Value::from(value)),
            ("class", true) => node.bound_class = Some(Bindable::bound(value)?),
            ("style", false) => node.style.entries = load_entries(key, value)?,
            ("style", true) => node.style.spread = Some(Bindable::bound(value)?),
            ("attrs", false) => node.attrs.entries = load_entries(key, value)?,
            ("attrs", true) => node.attrs.spread = Some(Bindable::bound(value)?),
            ("props", false) => node.props.entries = load_entries(key, value)?,
            ("props", true) => node.props.spread = Some(Bindable::bound(value)?),
            ("domProps", false) => node.dom_props.entries = load_entries(key, value)?,
            ("domProps", true) => node.dom_props.spread = Some(Bindable::bound(value)?),
            ("text", false) => node.text = Some(Value::from(value).to_text()),
            ("text", true) => node.bound_text = Some(Bindable::bound(value)?),
            ("html", false) => {
                // A bound form wins over the raw one.
                if node.html.is_none() {
                    node.html = Some(Bindable::literal(Value::from(value).to_text()));
                }
            }
            ("html", true) => node.html = Some(Bindable::bound(value)?),
            ("children", false) => {
                node.children = Some(match value {
                    Json::Array(items) => items.iter().map(load_node).collect::<Result<_>>()?,
                    single => vec![load_node(single)?],
                })
            }
            ("for", false) => node.repeat = Some(Bindable::literal(Value::from(value))),
            ("for", true) => node.repeat = Some(Bindable::bound(value)?),
            ("key", false) => node.key = Some(Bindable::literal(Value::from(value))),
            ("key", true) => node.key = Some(Bindable::bound(value)?),
            ("on", false) => node.on = load_handlers(key, value)?,
            ("nativeOn", false) => node.native_on = load_handlers(key, value)?,
            ("scopedSlots", false) => {
                let slots = value
                    .as_object()
                    .ok_or_else(|| Error::invalid_schema("`scopedSlots` must be an object"))?;
                for (name, content) in slots {
                    node.scoped_slots
                        .insert(name.clone(), Rc::new(load_node(content)?));
                }
            }
            ("slot", false) => node.slot = Some(string_field(key, value)?),
            ("ref", false) => node.reference = Some(string_field(key, value)?),
            ("refInFor", false) => node.ref_in_for = Value::from(value).truthy(),
            _ if KNOWN_KEYS.contains(&key) => {
                return Err(Error::invalid_schema(format!(
                    "`{}` has no bound form",
                    key
                )))
            }
            _ => trace!(key = %raw_key, "Ignoring unknown schema key"),
        }
    }

    Ok(node)
}

fn load_entries(field: &str, value: &Json) -> Result<IndexMap<String, Bindable>> {
    let object = value
        .as_object()
        .ok_or_else(|| Error::invalid_schema(format!("`{}` must be an object", field)))?;

    let mut entries = IndexMap::new();
    for (raw_key, entry) in object {
        let (name, bound) = split_marker(raw_key);
        let bindable = if bound {
            Bindable::bound(entry)?
        } else {
            Bindable::literal(Value::from(entry))
        };
        entries.insert(name.to_string(), bindable);
    }
    Ok(entries)
}

fn load_handlers(field: &str, value: &Json) -> Result<IndexMap<String, Handler>> {
    Ok(load_entries(field, value)?
        .into_iter()
        .map(|(event, bindable)| (event, Handler::Binding(bindable)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingPath;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_bound_keys_are_classified_once() {
        let node = SchemaNode::from_json(&json!({
            "component": "div",
            "namespace": "root",
            ":text": "root.title",
            "attrs": { "id": "static", ":title": "|> root.title" },
            "data": { "title": "T" }
        }))
        .unwrap();

        assert_eq!(
            node.bound_text,
            Some(Bindable::Path(BindingPath::parse("root.title").unwrap()))
        );
        assert_eq!(node.attrs.entries["id"], Bindable::literal("static"));
        assert!(matches!(node.attrs.entries["title"], Bindable::Expression(_)));
    }

    #[test]
    fn test_single_child_object_becomes_list() {
        let node = SchemaNode::from_json(&json!({
            "component": "div",
            "children": { "component": "span" }
        }))
        .unwrap();
        assert_eq!(node.children.map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_inline_component_is_kept() {
        let node = SchemaNode::from_json(&json!({
            "component": { "tag": "section" }
        }))
        .unwrap();
        assert_eq!(
            node.component,
            ComponentSpec::Inline(Value::from(json!({ "tag": "section" })))
        );
    }

    #[test]
    fn test_loop_without_namespace_is_rejected() {
        let err = SchemaNode::from_json(&json!({
            "component": "ul",
            "children": { "component": "li", "for": [1, 2] }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn test_invalid_binding_path_fails_at_load() {
        let err = SchemaNode::from_json(&json!({
            "component": "div",
            ":text": "ns..broken"
        }))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidBindingPath { .. }));
    }

    #[test]
    fn test_missing_component_is_rejected() {
        assert!(SchemaNode::parse(r#"{"namespace": "x"}"#).is_err());
    }

    #[test]
    fn test_bound_html_wins_over_raw() {
        let node = SchemaNode::from_json(&json!({
            "component": "div",
            ":html": "root.markup",
            "html": "<b>raw</b>"
        }))
        .unwrap();
        assert!(matches!(node.html, Some(Bindable::Path(_))));
    }
}
