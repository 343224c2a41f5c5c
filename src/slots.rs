//! Scoped slot context.
//!
//! Each `scopedSlots` entry becomes a [`SlotFactory`]. Invoking it registers
//! the props as the `(namespace, slot)` bucket under the owning node's frame
//! and builds the slot content there, so only that content (and anything
//! nested in it) can read `namespace#slot.*`.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::builder::{NodeBuilder, Site};
use crate::error::{Error, Result};
use crate::payload::SlotFactory;
use crate::renderer::Renderer;
use crate::schema::SchemaNode;
use crate::scope::ScopeId;
use crate::value::Value;

impl<R: Renderer + 'static> NodeBuilder<R> {
    pub(crate) fn slot_factories(
        &self,
        node: &SchemaNode,
        site: &Site,
    ) -> Result<IndexMap<String, SlotFactory<R::Node>>> {
        let namespace = node.namespace.clone().ok_or_else(|| {
            Error::invalid_schema("a node declaring scoped slots must declare a namespace")
        })?;

        let mut factories = IndexMap::new();
        for (slot, content) in &node.scoped_slots {
            let builder = self.clone();
            let owner = site.scope;
            let namespace = namespace.clone();
            let slot_name = slot.clone();
            let content = Rc::clone(content);
            factories.insert(
                slot.clone(),
                SlotFactory::new(slot, move |props| {
                    builder.invoke_slot(owner, &namespace, &slot_name, &content, props)
                }),
            );
        }
        Ok(factories)
    }

    fn invoke_slot(
        &self,
        owner: ScopeId,
        namespace: &str,
        slot: &str,
        content: &SchemaNode,
        props: Value,
    ) -> Result<Option<R::Node>> {
        debug!(namespace, slot, "Invoking scoped slot");
        let scope = self.store().add_scope_store(owner, namespace, slot, props)?;
        self.build_node(content, &Site::frame(scope), 0)
    }
}
