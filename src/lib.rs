//! # Schema Interpreter
//!
//! Turns a declarative JSON schema tree into renderer calls, resolving
//! every bound value against a hierarchical scope store.
//!
//! ## Resolution Invariants
//!
//! 1. **Frames**: every node declaring a `namespace` owns one frame in the
//!    store, addressed by its position under the parent frame. Loop
//!    iterations own one frame each; scoped-slot invocations own one frame
//!    per `(namespace, slot)` bucket.
//!
//! 2. **Visibility**: a binding resolves by walking from the current frame
//!    toward the root. Ancestors are visible; siblings never are.
//!
//! 3. **Seeding**: `data` seeds a frame when the frame is created. Later
//!    passes reuse the frame and keep whatever was written into it.
//!
//! 4. **Faults**: a missing namespace, key or slot bucket is raised to the
//!    caller. Present-but-falsy values are values.
//!
//! 5. **Expressions**: `|>` bindings run in a sandbox that can only see
//!    the namespaces on the current frame chain and a fixed set of pure
//!    globals. Writes made through namespace members land in the store.
//!
//! 6. **Passes**: frames not reached by a successful render pass are swept
//!    when the pass finishes.

pub mod binding;
pub mod builder;
pub mod config;
pub mod error;
pub mod loops;
pub mod payload;
pub mod renderer;
pub mod sandbox;
pub mod schema;
pub mod scope;
mod slots;
pub mod tree;
pub mod value;
pub mod view;

#[cfg(feature = "napi")]
mod bridge;

#[cfg(test)]
mod expression_tests;
#[cfg(test)]
mod render_tests;

#[cfg(feature = "napi")]
pub use bridge::{interpreter_bridge, render_schema_html_native, render_schema_native};

pub use binding::{Bindable, BindingPath, Expression};
pub use builder::{NodeBuilder, Resolver};
pub use config::InterpreterConfig;
pub use error::{Error, Result};
pub use payload::{Listener, Payload, SlotFactory};
pub use renderer::{Children, ComponentRegistry, NoComponents, Renderer, ResolvedComponent};
pub use sandbox::Sandbox;
pub use schema::{ComponentSpec, SchemaNode};
pub use scope::{ScopeId, StoreChange, StoreHandle};
pub use tree::{component, ComponentCall, ComponentFn, RenderedNode, TreeRenderer};
pub use value::{Callable, Map, Value};
pub use view::SchemaView;
