//! The host seam: how built nodes become output, and how component names
//! become components.

use std::collections::HashMap;

use crate::error::Result;
use crate::payload::Payload;
use crate::value::Value;

/// What a node's `component` entry resolved to.
#[derive(Debug, Clone)]
pub enum ResolvedComponent<C> {
    /// A name the registry knows.
    Registered { name: String, component: C },
    /// An inline component definition given in the schema.
    Inline(Value),
    /// A name the registry does not know, treated as an intrinsic tag.
    Tag(String),
}

#[derive(Debug, Default)]
pub enum Children<N> {
    #[default]
    None,
    Text(String),
    Html(String),
    Nodes(Vec<N>),
}

pub trait Renderer {
    type Node: 'static;
    type Component: Clone + 'static;

    fn create_node(
        &self,
        component: &ResolvedComponent<Self::Component>,
        payload: Payload<Self::Node>,
        children: Children<Self::Node>,
    ) -> Result<Self::Node>;
}

pub trait ComponentRegistry<C> {
    fn resolve(&self, name: &str) -> Option<C>;
}

impl<C: Clone> ComponentRegistry<C> for HashMap<String, C> {
    fn resolve(&self, name: &str) -> Option<C> {
        self.get(name).cloned()
    }
}

/// Registry that knows no components: every name is an intrinsic tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoComponents;

impl<C> ComponentRegistry<C> for NoComponents {
    fn resolve(&self, _name: &str) -> Option<C> {
        None
    }
}
