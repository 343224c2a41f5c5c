//! Hierarchical scope store.
//!
//! ## Invariants
//!
//! 1. **Frames**: every schema node that declares a `namespace` owns one frame,
//!    addressed by a generated path (`parent/position:namespace`, loop
//!    iterations open `[i]` beneath the loop node's frame). Author-supplied namespace strings never need to
//!    be globally unique.
//! 2. **Visibility**: resolution walks from the current frame towards the root.
//!    Ancestors are visible, siblings and their descendants never are.
//! 3. **Slot buckets**: a scoped-slot invocation opens a slot frame under the
//!    owning node's frame. Only the slot content (and anything nested in it)
//!    has that frame on its chain.
//! 4. **Presence**: only absent members are missing. `0`, `""`, `false` and
//!    `null` are present values.
//! 5. **Lifetime**: frames persist across render passes; `finish_pass` drops
//!    frames the pass did not touch.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::binding::BindingPath;
use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Reserved member under which a loop iteration exposes `{index, value, key}`.
pub const LOOP_KEY: &str = "$for";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const ROOT: Self = Self(0);
}

#[derive(Debug, Clone, PartialEq)]
enum FrameKind {
    Root,
    Namespace(String),
    Slot { namespace: String, slot: String },
}

#[derive(Debug)]
struct Frame {
    path: String,
    parent: Option<ScopeId>,
    kind: FrameKind,
    data: Value,
    epoch: u64,
}

#[derive(Debug)]
pub struct ScopeStore {
    frames: HashMap<ScopeId, Frame>,
    by_path: HashMap<String, ScopeId>,
    next_id: u32,
    epoch: u64,
}

impl Default for ScopeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStore {
    pub fn new() -> Self {
        let mut frames = HashMap::new();
        frames.insert(
            ScopeId::ROOT,
            Frame {
                path: String::new(),
                parent: None,
                kind: FrameKind::Root,
                data: Value::Null,
                epoch: 0,
            },
        );
        let mut by_path = HashMap::new();
        by_path.insert(String::new(), ScopeId::ROOT);

        Self {
            frames,
            by_path,
            next_id: 1,
            epoch: 0,
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.len() <= 1
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Generated address of a frame.
    pub fn path_of(&self, scope: ScopeId) -> Option<&str> {
        self.frames.get(&scope).map(|f| f.path.as_str())
    }

    pub fn scope_at(&self, path: &str) -> Option<ScopeId> {
        self.by_path.get(path).copied()
    }

    fn frame(&self, scope: ScopeId) -> Result<&Frame> {
        self.frames.get(&scope).ok_or(Error::ScopeReleased)
    }

    fn frame_mut(&mut self, scope: ScopeId) -> Result<&mut Frame> {
        self.frames.get_mut(&scope).ok_or(Error::ScopeReleased)
    }

    /// Nearest frame on the chain starting at `scope` (inclusive) that
    /// satisfies `pred`.
    fn find_in_chain(
        &self,
        scope: ScopeId,
        pred: impl Fn(&FrameKind) -> bool,
    ) -> Result<Option<ScopeId>> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let frame = self.frame(id)?;
            if pred(&frame.kind) {
                return Ok(Some(id));
            }
            cursor = frame.parent;
        }
        Ok(None)
    }

    fn namespace_frame(&self, scope: ScopeId, namespace: &str) -> Result<Option<ScopeId>> {
        self.find_in_chain(
            scope,
            |kind| matches!(kind, FrameKind::Namespace(ns) if ns == namespace),
        )
    }

    fn open(&mut self, parent: ScopeId, segment: &str, kind: FrameKind) -> Result<(ScopeId, bool)> {
        let path = format!("{}/{}", self.frame(parent)?.path, segment);
        let epoch = self.epoch;

        if let Some(&id) = self.by_path.get(&path) {
            let frame = self.frame_mut(id)?;
            frame.epoch = epoch;
            if frame.kind == kind {
                return Ok((id, false));
            }
            // Same position now declares a different namespace: start over.
            frame.kind = kind;
            frame.data = Value::Object(Map::new());
            return Ok((id, true));
        }

        let id = ScopeId(self.next_id);
        self.next_id += 1;
        trace!(path = %path, "Opening scope frame");
        self.frames.insert(
            id,
            Frame {
                path: path.clone(),
                parent: Some(parent),
                kind,
                data: Value::Object(Map::new()),
                epoch,
            },
        );
        self.by_path.insert(path, id);
        Ok((id, true))
    }

    /// Opens (or re-enters) the frame for a namespaced node. The flag is
    /// `true` when the frame did not exist yet and still needs its data.
    pub fn open_namespace(
        &mut self,
        parent: ScopeId,
        segment: &str,
        namespace: &str,
    ) -> Result<(ScopeId, bool)> {
        self.open(parent, segment, FrameKind::Namespace(namespace.to_string()))
    }

    /// Shallow-merges `data` into the nearest `namespace` bucket visible from
    /// `scope`. Same keys overwrite, untouched keys persist.
    pub fn add_data(&mut self, scope: ScopeId, namespace: &str, data: Map) -> Result<()> {
        let id = self
            .namespace_frame(scope, namespace)?
            .ok_or_else(|| Error::NamespaceNotFound {
                namespace: namespace.to_string(),
            })?;
        let frame = self.frame_mut(id)?;
        match &mut frame.data {
            Value::Object(bucket) => bucket.extend(data),
            other => *other = Value::Object(data),
        }
        Ok(())
    }

    /// Registers or refreshes the `(namespace, slot)` bucket under the owning
    /// frame and returns the slot frame the slot content builds in.
    pub fn add_scope_store(
        &mut self,
        owner: ScopeId,
        namespace: &str,
        slot: &str,
        data: Value,
    ) -> Result<ScopeId> {
        let segment = format!("#{}/{}", namespace, slot);
        let (id, _) = self.open(
            owner,
            &segment,
            FrameKind::Slot {
                namespace: namespace.to_string(),
                slot: slot.to_string(),
            },
        )?;
        self.frame_mut(id)?.data = data;
        Ok(id)
    }

    /// Writes the per-iteration `{index, value, key}` into a namespace frame.
    pub fn set_loop_binding(&mut self, scope: ScopeId, binding: Value) -> Result<()> {
        let frame = self.frame_mut(scope)?;
        match (&frame.kind, &mut frame.data) {
            (FrameKind::Namespace(_), Value::Object(bucket)) => {
                bucket.insert(LOOP_KEY.to_string(), binding);
                Ok(())
            }
            _ => Err(Error::invalid_schema(
                "loop bindings require a namespaced node",
            )),
        }
    }

    pub fn get(&self, scope: ScopeId, path: &BindingPath) -> Result<Value> {
        trace!(path = %path, "Resolving binding");
        let (root, label) = match path.slot() {
            Some(slot) => {
                let namespace = path.namespace();
                let id = self
                    .find_in_chain(scope, |kind| {
                        matches!(kind, FrameKind::Slot { namespace: ns, slot: s } if ns == namespace && s == slot)
                    })?
                    .ok_or_else(|| Error::SlotContextNotFound {
                        namespace: namespace.to_string(),
                        slot: slot.to_string(),
                    })?;
                (&self.frame(id)?.data, format!("{}#{}", namespace, slot))
            }
            None => {
                let id = self
                    .namespace_frame(scope, path.namespace())?
                    .ok_or_else(|| Error::NamespaceNotFound {
                        namespace: path.namespace().to_string(),
                    })?;
                (&self.frame(id)?.data, path.namespace().to_string())
            }
        };

        let mut current = root;
        for key in path.keys() {
            current = current.member(key).ok_or_else(|| Error::KeyNotFound {
                namespace: label.clone(),
                key: key.clone(),
            })?;
        }
        Ok(current.clone())
    }

    /// Data of the nearest visible `namespace`, if any.
    pub fn namespace_data(&self, scope: ScopeId, namespace: &str) -> Result<Option<Value>> {
        match self.namespace_frame(scope, namespace)? {
            Some(id) => Ok(Some(self.frame(id)?.data.clone())),
            None => Ok(None),
        }
    }

    /// Assigns `value` at `namespace.keys...`. The last key may be new;
    /// every intermediate member must exist. Returns the absolute address of
    /// the written member.
    pub fn write(
        &mut self,
        scope: ScopeId,
        namespace: &str,
        keys: &[String],
        value: Value,
    ) -> Result<String> {
        let (last, parents) = keys.split_last().ok_or_else(|| {
            Error::type_error(format!("cannot reassign namespace `{}`", namespace))
        })?;
        let id = self
            .namespace_frame(scope, namespace)?
            .ok_or_else(|| Error::NamespaceNotFound {
                namespace: namespace.to_string(),
            })?;
        let frame = self.frame_mut(id)?;
        let address = format!("{}:{}.{}", frame.path, namespace, keys.join("."));

        let mut target = &mut frame.data;
        for key in parents {
            target = target.member_mut(key).ok_or_else(|| Error::KeyNotFound {
                namespace: namespace.to_string(),
                key: key.clone(),
            })?;
        }
        match target {
            Value::Object(map) => {
                map.insert(last.clone(), value);
            }
            Value::Array(items) => {
                let slot = last
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| Error::KeyNotFound {
                        namespace: namespace.to_string(),
                        key: last.clone(),
                    })?;
                *slot = value;
            }
            other => {
                return Err(Error::type_error(format!(
                    "cannot set member `{}` on {}",
                    last,
                    other.type_name()
                )))
            }
        }
        Ok(address)
    }

    /// Starts a render pass. Frames opened or re-entered from now on carry the
    /// new epoch.
    pub fn begin_pass(&mut self) -> u64 {
        self.epoch += 1;
        let epoch = self.epoch;
        if let Some(root) = self.frames.get_mut(&ScopeId::ROOT) {
            root.epoch = epoch;
        }
        epoch
    }

    /// Drops frames the current pass did not touch. Returns how many went.
    pub fn finish_pass(&mut self) -> usize {
        let epoch = self.epoch;
        let before = self.frames.len();
        self.frames.retain(|_, frame| frame.epoch == epoch);
        let frames = &self.frames;
        self.by_path.retain(|_, id| frames.contains_key(id));
        let removed = before - self.frames.len();
        if removed > 0 {
            debug!(removed, remaining = self.frames.len(), "Swept stale scope frames");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(json: serde_json::Value) -> Map {
        match Value::from(json) {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    fn path(raw: &str) -> BindingPath {
        BindingPath::parse(raw).unwrap()
    }

    #[test]
    fn test_registered_namespace_resolves() {
        let mut store = ScopeStore::new();
        let (ns, created) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        assert!(created);
        store.add_data(ns, "ns", map(json!({ "p": "v" }))).unwrap();

        assert_eq!(store.get(ns, &path("ns.p")).unwrap(), Value::from("v"));
        assert_eq!(
            store.get(ns, &path("ns2.p")),
            Err(Error::NamespaceNotFound {
                namespace: "ns2".to_string()
            })
        );
    }

    #[test]
    fn test_missing_key_reports_first_absent_member() {
        let mut store = ScopeStore::new();
        let (ns, _) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        store
            .add_data(ns, "ns", map(json!({ "user": { "name": "a" } })))
            .unwrap();

        assert_eq!(
            store.get(ns, &path("ns.user.email.domain")),
            Err(Error::KeyNotFound {
                namespace: "ns".to_string(),
                key: "email".to_string()
            })
        );
    }

    #[test]
    fn test_falsy_values_are_present() {
        let mut store = ScopeStore::new();
        let (ns, _) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        store
            .add_data(
                ns,
                "ns",
                map(json!({ "zero": 0, "empty": "", "off": false, "nil": null })),
            )
            .unwrap();

        assert_eq!(store.get(ns, &path("ns.zero")).unwrap(), Value::Number(0.0));
        assert_eq!(store.get(ns, &path("ns.empty")).unwrap(), Value::from(""));
        assert_eq!(store.get(ns, &path("ns.off")).unwrap(), Value::Bool(false));
        assert_eq!(store.get(ns, &path("ns.nil")).unwrap(), Value::Null);
    }

    #[test]
    fn test_add_data_merges_shallowly() {
        let mut store = ScopeStore::new();
        let (ns, _) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        store
            .add_data(ns, "ns", map(json!({ "a": 1, "nested": { "x": 1, "y": 2 } })))
            .unwrap();
        store
            .add_data(ns, "ns", map(json!({ "b": 2, "nested": { "x": 3 } })))
            .unwrap();

        assert_eq!(store.get(ns, &path("ns.a")).unwrap(), Value::Number(1.0));
        assert_eq!(store.get(ns, &path("ns.b")).unwrap(), Value::Number(2.0));
        assert_eq!(
            store.get(ns, &path("ns.nested")).unwrap(),
            Value::from(json!({ "x": 3 }))
        );
    }

    #[test]
    fn test_siblings_do_not_see_each_other() {
        let mut store = ScopeStore::new();
        let (parent, _) = store.open_namespace(store.root(), "0:parent", "parent").unwrap();
        let (child1, _) = store.open_namespace(parent, "0:child1", "child1").unwrap();
        let (child2, _) = store.open_namespace(parent, "1:child2", "child2").unwrap();
        store
            .add_data(child1, "child1", map(json!({ "secret": "x" })))
            .unwrap();
        store
            .add_data(parent, "parent", map(json!({ "shared": "y" })))
            .unwrap();

        assert_eq!(
            store.get(child2, &path("child1.secret")),
            Err(Error::NamespaceNotFound {
                namespace: "child1".to_string()
            })
        );
        assert_eq!(store.get(child2, &path("parent.shared")).unwrap(), Value::from("y"));
    }

    #[test]
    fn test_nearest_namespace_shadows_outer() {
        let mut store = ScopeStore::new();
        let (outer, _) = store.open_namespace(store.root(), "0:row", "row").unwrap();
        let (inner, _) = store.open_namespace(outer, "0:row[0]", "row").unwrap();
        store.set_loop_binding(outer, Value::from("outer")).unwrap();
        store.set_loop_binding(inner, Value::from("inner")).unwrap();

        assert_eq!(store.get(inner, &path("row.$for")).unwrap(), Value::from("inner"));
        assert_eq!(store.get(outer, &path("row.$for")).unwrap(), Value::from("outer"));
    }

    #[test]
    fn test_slot_buckets_are_independent() {
        let mut store = ScopeStore::new();
        let (owner, _) = store.open_namespace(store.root(), "0:list", "list").unwrap();
        let header = store
            .add_scope_store(owner, "list", "header", Value::from(json!({ "title": "T" })))
            .unwrap();
        let item = store
            .add_scope_store(owner, "list", "item", Value::from(json!({ "row": 1 })))
            .unwrap();

        assert_eq!(store.get(header, &path("list#header.title")).unwrap(), Value::from("T"));
        assert_eq!(store.get(item, &path("list#item.row")).unwrap(), Value::Number(1.0));
        assert_eq!(
            store.get(item, &path("list#header.title")),
            Err(Error::SlotContextNotFound {
                namespace: "list".to_string(),
                slot: "header".to_string()
            })
        );
    }

    #[test]
    fn test_slot_refresh_replaces_props() {
        let mut store = ScopeStore::new();
        let (owner, _) = store.open_namespace(store.root(), "0:root", "root").unwrap();
        let first = store
            .add_scope_store(owner, "root", "default", Value::from(json!({ "scopedData": "A" })))
            .unwrap();
        let second = store
            .add_scope_store(owner, "root", "default", Value::from(json!({ "scopedData": "B" })))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(
            store.get(second, &path("root#default.scopedData")).unwrap(),
            Value::from("B")
        );
    }

    #[test]
    fn test_write_creates_leaf_but_not_parents() {
        let mut store = ScopeStore::new();
        let (ns, _) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        store.add_data(ns, "ns", map(json!({ "user": {} }))).unwrap();

        store
            .write(ns, "ns", &["user".to_string(), "name".to_string()], Value::from("a"))
            .unwrap();
        assert_eq!(store.get(ns, &path("ns.user.name")).unwrap(), Value::from("a"));

        assert_eq!(
            store.write(ns, "ns", &["missing".to_string(), "x".to_string()], Value::Null),
            Err(Error::KeyNotFound {
                namespace: "ns".to_string(),
                key: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_reopening_keeps_data() {
        let mut store = ScopeStore::new();
        let (first, created) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        assert!(created);
        store.add_data(first, "ns", map(json!({ "a": 1 }))).unwrap();

        let (second, created) = store.open_namespace(store.root(), "0:ns", "ns").unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(store.get(second, &path("ns.a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_finish_pass_sweeps_untouched_frames() {
        let mut store = ScopeStore::new();
        store.begin_pass();
        let (a, _) = store.open_namespace(store.root(), "0:a", "a").unwrap();
        let (b, _) = store.open_namespace(store.root(), "1:b", "b").unwrap();
        assert_eq!(store.finish_pass(), 0);

        store.begin_pass();
        store.open_namespace(store.root(), "0:a", "a").unwrap();
        assert_eq!(store.finish_pass(), 1);

        assert!(store.path_of(a).is_some());
        assert!(store.path_of(b).is_none());
        assert_eq!(store.get(b, &path("b.x")), Err(Error::ScopeReleased));
    }
}
