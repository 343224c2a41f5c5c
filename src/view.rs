//! One mounted schema tree: its schema, builder and scope store.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use crate::builder::NodeBuilder;
use crate::config::InterpreterConfig;
use crate::error::Result;
use crate::renderer::{ComponentRegistry, Renderer};
use crate::schema::SchemaNode;
use crate::scope::StoreHandle;

pub struct SchemaView<R: Renderer + 'static> {
    schema: SchemaNode,
    builder: NodeBuilder<R>,
    dirty: Rc<Cell<bool>>,
}

impl<R: Renderer + 'static> SchemaView<R> {
    pub fn new(
        schema: SchemaNode,
        renderer: R,
        registry: impl ComponentRegistry<R::Component> + 'static,
        config: InterpreterConfig,
    ) -> Self {
        let store = StoreHandle::new();
        let dirty = Rc::new(Cell::new(true));
        let flag = Rc::clone(&dirty);
        store.subscribe(move |_| flag.set(true));

        Self {
            schema,
            builder: NodeBuilder::new(renderer, registry, &config, store),
            dirty,
        }
    }

    pub fn from_json(
        json: &str,
        renderer: R,
        registry: impl ComponentRegistry<R::Component> + 'static,
        config: InterpreterConfig,
    ) -> Result<Self> {
        Ok(Self::new(SchemaNode::parse(json)?, renderer, registry, config))
    }

    /// Runs one full render pass. Frames the pass did not reach are dropped
    /// afterwards; a failed pass leaves the store as it was built so far.
    pub fn render(&self) -> Result<Option<R::Node>> {
        let store = self.builder.store();
        let epoch = store.begin_pass();
        debug!(epoch, "Render pass started");

        let output = self.builder.build(&self.schema)?;
        let swept = store.finish_pass();
        self.dirty.set(false);
        debug!(epoch, swept, "Render pass finished");
        Ok(output)
    }

    /// Whether the store was written since the last successful pass.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn store(&self) -> &StoreHandle {
        self.builder.store()
    }
}
