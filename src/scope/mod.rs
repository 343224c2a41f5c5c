//! Scope store: namespaced data buckets, scoped-slot buckets and loop
//! bindings, resolved along the frame chain of the node being built.

mod handle;
mod store;

pub use handle::{ChangeListener, StoreChange, StoreHandle};
pub use store::{ScopeId, ScopeStore, LOOP_KEY};
