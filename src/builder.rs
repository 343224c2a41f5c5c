//! Node builder.
//!
//! Walks a schema depth-first, pre-order, left-to-right. Per node:
//!
//! 1. structural validation hook
//! 2. static `if: false` omits the node before anything is registered
//! 3. namespaced nodes open their frame; `data` seeds it on creation
//! 4. bound `if` resolves falsy -> omitted
//! 5. payload assembly (`show: false` forces a hidden style last)
//! 6. children by precedence: scoped slots, bound text, html, text, children
//! 7. children carrying `for` expand through the loop expander
//! 8. the renderer creates the node

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::binding::Bindable;
use crate::config::InterpreterConfig;
use crate::error::{Error, Result};
use crate::payload::{Listener, Payload};
use crate::renderer::{Children, ComponentRegistry, Renderer, ResolvedComponent};
use crate::sandbox::Sandbox;
use crate::schema::{BindableMap, ComponentSpec, Handler, SchemaNode};
use crate::scope::{ScopeId, StoreHandle};
use crate::value::Value;

/// Where a node is being built: the frame it resolves against, and the
/// positions walked since that frame was opened.
#[derive(Debug, Clone)]
pub(crate) struct Site {
    pub(crate) scope: ScopeId,
    prefix: String,
}

impl Site {
    pub(crate) fn frame(scope: ScopeId) -> Self {
        Self {
            scope,
            prefix: String::new(),
        }
    }
}

/// Resolves bindables against the store. Cheap to clone; listeners keep one.
#[derive(Debug, Clone)]
pub struct Resolver {
    store: StoreHandle,
    sandbox: Sandbox,
}

impl Resolver {
    pub fn new(store: StoreHandle, config: &InterpreterConfig) -> Self {
        Self {
            store,
            sandbox: Sandbox::new(config),
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn resolve(&self, bindable: &Bindable, scope: ScopeId) -> Result<Value> {
        match bindable {
            Bindable::Literal(value) => Ok(value.clone()),
            Bindable::Path(path) => self.store.get(scope, path),
            Bindable::Expression(expr) => self.sandbox.evaluate(expr, &self.store, scope),
        }
    }
}

struct Shared<R: Renderer> {
    renderer: R,
    registry: Box<dyn ComponentRegistry<R::Component>>,
    resolver: Resolver,
}

pub struct NodeBuilder<R: Renderer> {
    shared: Rc<Shared<R>>,
}

impl<R: Renderer> Clone for NodeBuilder<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<R: Renderer + 'static> NodeBuilder<R> {
    pub fn new(
        renderer: R,
        registry: impl ComponentRegistry<R::Component> + 'static,
        config: &InterpreterConfig,
        store: StoreHandle,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                renderer,
                registry: Box::new(registry),
                resolver: Resolver::new(store, config),
            }),
        }
    }

    pub fn store(&self) -> &StoreHandle {
        self.shared.resolver.store()
    }

    pub fn resolver(&self) -> &Resolver {
        &self.shared.resolver
    }

    pub fn renderer(&self) -> &R {
        &self.shared.renderer
    }

    /// Builds `root` against the store's root frame. `None` when the root
    /// itself is omitted.
    pub fn build(&self, root: &SchemaNode) -> Result<Option<R::Node>> {
        if root.repeat.is_some() {
            return Err(Error::invalid_schema("the root node cannot carry `for`"));
        }
        self.build_node(root, &Site::frame(self.store().root()), 0)
    }

    pub(crate) fn build_node(
        &self,
        node: &SchemaNode,
        site: &Site,
        position: usize,
    ) -> Result<Option<R::Node>> {
        self.validate(node)?;
        if node.condition.literal == Some(false) {
            return Ok(None);
        }
        let entered = self.enter(node, site, position, None)?;
        self.build_entered(node, &entered)
    }

    /// Extension point for structural checks at build time.
    pub(crate) fn validate(&self, _node: &SchemaNode) -> Result<()> {
        Ok(())
    }

    /// Opens the node's frame when it declares a namespace. Namespace-less
    /// nodes stay in the current frame and only extend the position prefix.
    /// Iteration frames open as `[i]` under the loop node's own frame.
    pub(crate) fn enter(
        &self,
        node: &SchemaNode,
        site: &Site,
        position: usize,
        iteration: Option<usize>,
    ) -> Result<Site> {
        let Some(namespace) = node.namespace.as_deref() else {
            return Ok(Site {
                scope: site.scope,
                prefix: format!("{}{}.", site.prefix, position),
            });
        };

        let segment = match iteration {
            Some(i) => format!("[{}]", i),
            None => format!("{}{}:{}", site.prefix, position, namespace),
        };
        let (scope, created) = self.store().open_namespace(site.scope, &segment, namespace)?;
        if created {
            if let Some(data) = &node.data {
                self.store().add_data(scope, namespace, data.clone())?;
            }
        }
        Ok(Site::frame(scope))
    }

    pub(crate) fn build_entered(&self, node: &SchemaNode, site: &Site) -> Result<Option<R::Node>> {
        if let Some(condition) = &node.condition.bound {
            if !self.resolver().resolve(condition, site.scope)?.truthy() {
                return Ok(None);
            }
        }

        let component = self.resolve_component(&node.component);
        let payload = self.payload(node, site)?;
        let children = self.children(node, site)?;
        trace!(namespace = ?node.namespace, "Creating node");
        self.renderer()
            .create_node(&component, payload, children)
            .map(Some)
    }

    fn resolve_component(&self, spec: &ComponentSpec) -> ResolvedComponent<R::Component> {
        match spec {
            ComponentSpec::Name(name) => match self.shared.registry.resolve(name) {
                Some(component) => ResolvedComponent::Registered {
                    name: name.clone(),
                    component,
                },
                None => ResolvedComponent::Tag(name.clone()),
            },
            ComponentSpec::Inline(definition) => ResolvedComponent::Inline(definition.clone()),
        }
    }

    fn payload(&self, node: &SchemaNode, site: &Site) -> Result<Payload<R::Node>> {
        let scope = site.scope;
        let resolver = self.resolver();
        let mut payload = Payload::default();

        if let Some(class) = &node.class {
            payload.merge_class(class);
        }
        if let Some(bound) = &node.bound_class {
            payload.merge_class(&resolver.resolve(bound, scope)?);
        }

        self.merge_map(&mut payload.style, "style", &node.style, scope)?;
        self.merge_map(&mut payload.attrs, "attrs", &node.attrs, scope)?;
        self.merge_map(&mut payload.props, "props", &node.props, scope)?;
        self.merge_map(&mut payload.dom_props, "domProps", &node.dom_props, scope)?;

        let mut visible = node.show.literal.unwrap_or(true);
        if let Some(bound) = &node.show.bound {
            visible = visible && resolver.resolve(bound, scope)?.truthy();
        }
        if !visible {
            payload.style.shift_remove("display");
            payload
                .style
                .insert("display".to_string(), Value::from("none"));
        }

        if let Some(key) = &node.key {
            payload.key = Some(resolver.resolve(key, scope)?);
        }
        payload.reference = node.reference.clone();
        payload.ref_in_for = node.ref_in_for;
        payload.slot = node.slot.clone();

        payload.on = self.listeners(&node.on, scope);
        payload.native_on = self.listeners(&node.native_on, scope);

        if !node.scoped_slots.is_empty() {
            payload.scoped_slots = self.slot_factories(node, site)?;
        }
        Ok(payload)
    }

    fn merge_map(
        &self,
        target: &mut IndexMap<String, Value>,
        field: &str,
        source: &BindableMap,
        scope: ScopeId,
    ) -> Result<()> {
        if source.is_empty() {
            return Ok(());
        }
        for (name, bindable) in &source.entries {
            target.insert(name.clone(), self.resolver().resolve(bindable, scope)?);
        }
        if let Some(spread) = &source.spread {
            match self.resolver().resolve(spread, scope)? {
                Value::Object(map) => target.extend(map),
                Value::Null => {}
                other => {
                    return Err(Error::type_error(format!(
                        "`:{}` must resolve to an object, found {}",
                        field,
                        other.type_name()
                    )))
                }
            }
        }
        Ok(())
    }

    fn listeners(
        &self,
        handlers: &IndexMap<String, Handler>,
        scope: ScopeId,
    ) -> IndexMap<String, Listener> {
        handlers
            .iter()
            .map(|(event, handler)| (event.clone(), self.listener(event, handler, scope)))
            .collect()
    }

    /// Bound listeners resolve their target when fired. A path or literal
    /// must yield a function; an expression yielding a function is called,
    /// any other expression result is returned as is.
    fn listener(&self, event: &str, handler: &Handler, scope: ScopeId) -> Listener {
        match handler {
            Handler::Callback(callback) => {
                let callback = callback.clone();
                Listener::new(event, move |args| callback.call(args))
            }
            Handler::Binding(bindable) => {
                let resolver = self.resolver().clone();
                let bindable = bindable.clone();
                let name = event.to_string();
                Listener::new(event, move |args| {
                    trace!(event = %name, "Invoking listener");
                    match (resolver.resolve(&bindable, scope)?, &bindable) {
                        (Value::Function(function), _) => function.call(args),
                        (result, Bindable::Expression(_)) => Ok(result),
                        (_, Bindable::Path(path)) => Err(Error::NotCallable {
                            what: path.as_str().to_string(),
                        }),
                        (_, Bindable::Literal(_)) => Err(Error::NotCallable {
                            what: format!("listener for `{}`", name),
                        }),
                    }
                })
            }
        }
    }

    fn children(&self, node: &SchemaNode, site: &Site) -> Result<Children<R::Node>> {
        if !node.scoped_slots.is_empty() {
            return Ok(Children::None);
        }
        if let Some(bound) = &node.bound_text {
            let text = self.resolver().resolve(bound, site.scope)?;
            return Ok(Children::Text(text.to_text()));
        }
        if let Some(html) = &node.html {
            let markup = self.resolver().resolve(html, site.scope)?;
            return Ok(Children::Html(markup.to_text()));
        }
        if let Some(text) = &node.text {
            return Ok(Children::Text(text.clone()));
        }
        let Some(children) = &node.children else {
            return Ok(Children::None);
        };

        let mut nodes = Vec::with_capacity(children.len());
        for (position, child) in children.iter().enumerate() {
            match &child.repeat {
                Some(source) => nodes.extend(self.expand_loop(child, source, site, position)?),
                None => nodes.extend(self.build_node(child, site, position)?),
            }
        }
        Ok(Children::Nodes(nodes))
    }
}
