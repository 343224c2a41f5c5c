//! Attribute payload handed to a [`Renderer`](crate::renderer::Renderer) for
//! one node, plus the deferred callables it carries.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::value::Value;

/// An event listener bound to the node's scope. Resolution happens when the
/// listener fires, so it always sees the store as it is at that moment.
#[derive(Clone)]
pub struct Listener {
    event: Rc<str>,
    invoke: Rc<dyn Fn(&[Value]) -> Result<Value>>,
}

impl Listener {
    pub fn new(event: &str, invoke: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        Self {
            event: Rc::from(event),
            invoke: Rc::new(invoke),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.invoke)(args)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.event)
    }
}

/// Builds a scoped slot's content for the props the component passes in.
pub struct SlotFactory<N> {
    name: Rc<str>,
    invoke: Rc<dyn Fn(Value) -> Result<Option<N>>>,
}

impl<N> SlotFactory<N> {
    pub fn new(name: &str, invoke: impl Fn(Value) -> Result<Option<N>> + 'static) -> Self {
        Self {
            name: Rc::from(name),
            invoke: Rc::new(invoke),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers `props` as this slot's bucket and builds the slot content.
    pub fn invoke(&self, props: Value) -> Result<Option<N>> {
        (self.invoke)(props)
    }
}

impl<N> Clone for SlotFactory<N> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            invoke: Rc::clone(&self.invoke),
        }
    }
}

impl<N> fmt::Debug for SlotFactory<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotFactory({})", self.name)
    }
}

#[derive(Debug)]
pub struct Payload<N> {
    pub class: IndexMap<String, bool>,
    pub style: IndexMap<String, Value>,
    pub attrs: IndexMap<String, Value>,
    pub props: IndexMap<String, Value>,
    pub dom_props: IndexMap<String, Value>,
    pub on: IndexMap<String, Listener>,
    pub native_on: IndexMap<String, Listener>,
    pub scoped_slots: IndexMap<String, SlotFactory<N>>,
    pub key: Option<Value>,
    pub reference: Option<String>,
    pub ref_in_for: bool,
    pub slot: Option<String>,
}

impl<N> Default for Payload<N> {
    fn default() -> Self {
        Self {
            class: IndexMap::new(),
            style: IndexMap::new(),
            attrs: IndexMap::new(),
            props: IndexMap::new(),
            dom_props: IndexMap::new(),
            on: IndexMap::new(),
            native_on: IndexMap::new(),
            scoped_slots: IndexMap::new(),
            key: None,
            reference: None,
            ref_in_for: false,
            slot: None,
        }
    }
}

impl<N> Payload<N> {
    /// Class names switched on, in declaration order.
    pub fn active_classes(&self) -> impl Iterator<Item = &str> {
        self.class
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    /// Merges a class value (`"a b"`, `["a", {"b": true}]` or `{"a": true}`)
    /// into the class map. Later entries overwrite earlier ones.
    pub fn merge_class(&mut self, value: &Value) {
        match value {
            Value::String(s) => {
                for name in s.split_whitespace() {
                    self.class.insert(name.to_string(), true);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.merge_class(item);
                }
            }
            Value::Object(map) => {
                for (name, on) in map {
                    self.class.insert(name.clone(), on.truthy());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_class_normalization() {
        let mut payload: Payload<()> = Payload::default();
        payload.merge_class(&Value::from("a b"));
        payload.merge_class(&Value::from(json!(["c", { "d": true, "a": false }])));

        let active: Vec<_> = payload.active_classes().collect();
        assert_eq!(active, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_listener_forwards_arguments() {
        let listener = Listener::new("click", |args| Ok(args.first().cloned().unwrap_or_default()));
        assert_eq!(listener.event(), "click");
        assert_eq!(listener.call(&[Value::from("x")]).unwrap(), Value::from("x"));
    }
}
