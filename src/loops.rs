//! Loop expansion: one `for`-carrying schema node becomes one sibling per
//! element of its source.

use tracing::debug;

use crate::binding::Bindable;
use crate::builder::{NodeBuilder, Site};
use crate::error::{Error, Result};
use crate::renderer::Renderer;
use crate::schema::SchemaNode;
use crate::value::Value;

/// Per-iteration data exposed at `<namespace>.$for`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBinding {
    pub index: usize,
    pub value: Value,
    /// `null` for sequences, the member name for mappings.
    pub key: Value,
}

impl LoopBinding {
    pub fn into_value(self) -> Value {
        Value::object([
            ("index".to_string(), Value::from(self.index)),
            ("value".to_string(), self.value),
            ("key".to_string(), self.key),
        ])
    }
}

/// Iteration order of a loop source: sequence order, or member order for
/// mappings.
pub fn iterations(source: Value) -> Result<Vec<LoopBinding>> {
    match source {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, value)| LoopBinding {
                index,
                value,
                key: Value::Null,
            })
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .enumerate()
            .map(|(index, (key, value))| LoopBinding {
                index,
                value,
                key: Value::String(key),
            })
            .collect()),
        other => Err(Error::InvalidLoopSource {
            found: other.type_name().to_string(),
        }),
    }
}

impl<R: Renderer + 'static> NodeBuilder<R> {
    pub(crate) fn expand_loop(
        &self,
        node: &SchemaNode,
        source: &Bindable,
        site: &Site,
        position: usize,
    ) -> Result<Vec<R::Node>> {
        self.validate(node)?;
        if node.condition.literal == Some(false) {
            return Ok(Vec::new());
        }
        let namespace = node.namespace.as_deref().ok_or_else(|| {
            Error::invalid_schema("a node carrying `for` must declare a namespace")
        })?;

        // The node's own frame carries its `data`, so the source may read it.
        // The result is an owned copy; writes made while building iterations
        // cannot reach it.
        let anchor = self.enter(node, site, position, None)?;
        let bindings = iterations(self.resolver().resolve(source, anchor.scope)?)?;
        debug!(namespace, count = bindings.len(), "Expanding loop");

        let mut nodes = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let frame = self.enter(node, &anchor, 0, Some(binding.index))?;
            self.store()
                .set_loop_binding(frame.scope, binding.into_value())?;
            if let Some(built) = self.build_entered(node, &frame)? {
                nodes.push(built);
            }
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_sequence_iterations_have_null_keys() {
        let bindings = iterations(Value::from(json!(["a", "b"]))).unwrap();
        assert_eq!(
            bindings,
            vec![
                LoopBinding {
                    index: 0,
                    value: Value::from("a"),
                    key: Value::Null
                },
                LoopBinding {
                    index: 1,
                    value: Value::from("b"),
                    key: Value::Null
                },
            ]
        );
    }

    #[test]
    fn test_mapping_iterations_follow_member_order() {
        let bindings = iterations(Value::from(json!({ "key2": "b", "key1": "a" }))).unwrap();
        let keys: Vec<_> = bindings.iter().map(|b| b.key.to_text()).collect();
        assert_eq!(keys, vec!["key2", "key1"]);
    }

    #[test]
    fn test_scalar_source_is_rejected() {
        assert_eq!(
            iterations(Value::from("nope")),
            Err(Error::InvalidLoopSource {
                found: "string".to_string()
            })
        );
    }
}
