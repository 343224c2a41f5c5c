use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::store::{ScopeId, ScopeStore};
use crate::binding::BindingPath;
use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// A write performed through [`StoreHandle::write`] or
/// [`StoreHandle::write_path`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub scope: ScopeId,
    /// Absolute address of the written member.
    pub path: String,
    pub value: Value,
    pub revision: u64,
}

pub type ChangeListener = Rc<dyn Fn(&StoreChange)>;

/// Shared, interior-mutable access to one [`ScopeStore`].
///
/// Cloning the handle shares the store. Writes coming from expressions or
/// the host bump the revision and notify subscribers once the store borrow
/// is released, so a subscriber may read the store again.
#[derive(Clone, Default)]
pub struct StoreHandle {
    store: Rc<RefCell<ScopeStore>>,
    listeners: Rc<RefCell<Vec<ChangeListener>>>,
    revision: Rc<Cell<u64>>,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("frames", &self.store.borrow().len())
            .field("revision", &self.revision.get())
            .finish()
    }
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> ScopeId {
        self.store.borrow().root()
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Read-only access to the underlying store.
    pub fn with_store<T>(&self, f: impl FnOnce(&ScopeStore) -> T) -> T {
        f(&self.store.borrow())
    }

    pub fn subscribe(&self, listener: impl Fn(&StoreChange) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn get(&self, scope: ScopeId, path: &BindingPath) -> Result<Value> {
        self.store.borrow().get(scope, path)
    }

    pub fn open_namespace(
        &self,
        parent: ScopeId,
        segment: &str,
        namespace: &str,
    ) -> Result<(ScopeId, bool)> {
        self.store.borrow_mut().open_namespace(parent, segment, namespace)
    }

    pub fn add_data(&self, scope: ScopeId, namespace: &str, data: Map) -> Result<()> {
        self.store.borrow_mut().add_data(scope, namespace, data)
    }

    pub fn add_scope_store(
        &self,
        owner: ScopeId,
        namespace: &str,
        slot: &str,
        data: Value,
    ) -> Result<ScopeId> {
        self.store
            .borrow_mut()
            .add_scope_store(owner, namespace, slot, data)
    }

    pub fn set_loop_binding(&self, scope: ScopeId, binding: Value) -> Result<()> {
        self.store.borrow_mut().set_loop_binding(scope, binding)
    }

    pub fn namespace_data(&self, scope: ScopeId, namespace: &str) -> Result<Option<Value>> {
        self.store.borrow().namespace_data(scope, namespace)
    }

    pub fn write(
        &self,
        scope: ScopeId,
        namespace: &str,
        keys: &[String],
        value: Value,
    ) -> Result<()> {
        let path = self
            .store
            .borrow_mut()
            .write(scope, namespace, keys, value.clone())?;
        self.notify(StoreChange {
            scope,
            path,
            value,
            revision: 0,
        });
        Ok(())
    }

    /// Host-side write through a binding path. Slot buckets belong to the
    /// component that invoked the slot and cannot be written here.
    pub fn write_path(&self, scope: ScopeId, path: &BindingPath, value: Value) -> Result<()> {
        if path.slot().is_some() {
            return Err(Error::InvalidBindingPath {
                path: path.as_str().to_string(),
            });
        }
        self.write(scope, path.namespace(), path.keys(), value)
    }

    pub fn begin_pass(&self) -> u64 {
        self.store.borrow_mut().begin_pass()
    }

    pub fn finish_pass(&self) -> usize {
        self.store.borrow_mut().finish_pass()
    }

    fn notify(&self, mut change: StoreChange) {
        let revision = self.revision.get() + 1;
        self.revision.set(revision);
        change.revision = revision;
        debug!(path = %change.path, revision, "Store changed");

        let listeners: Vec<ChangeListener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&change);
        }
    }
}
