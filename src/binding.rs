//! Binding normalization.
//!
//! Schema values are classified once, at load time, into [`Bindable`]:
//! a literal, a binding path into the scope store, or a sandbox expression.
//! Resolution never re-inspects string prefixes.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};
use crate::sandbox::{self, CompiledExpression};
use crate::value::Value;

/// Prefix marking a schema key as bound (`":text"`, `"attrs": {":id": ..}`).
pub const BINDING_MARKER: char = ':';

/// Prefix marking a bound string as an expression rather than a path.
pub const EXPRESSION_MARKER: &str = "|>";

/// Separates a namespace from its key path.
pub const PATH_SEPARATOR: char = '.';

/// Separates a namespace from a scoped-slot name.
pub const SLOT_SEPARATOR: char = '#';

lazy_static! {
    static ref PATH_RE: Regex =
        Regex::new(r"^([A-Za-z_$][\w$-]*)(?:#([A-Za-z_$][\w$-]*))?((?:\.[^.]+)*)$").unwrap();
}

/// `namespace.key.path` or `namespace#slot.key.path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPath {
    raw: String,
    namespace: String,
    slot: Option<String>,
    keys: Vec<String>,
}

impl BindingPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidBindingPath {
            path: raw.to_string(),
        };
        let caps = PATH_RE.captures(raw.trim()).ok_or_else(invalid)?;
        let namespace = caps.get(1).ok_or_else(invalid)?.as_str().to_string();
        let slot = caps.get(2).map(|m| m.as_str().to_string());
        let keys = caps
            .get(3)
            .map(|m| m.as_str())
            .unwrap_or("")
            .split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            raw: raw.trim().to_string(),
            namespace,
            slot,
            keys,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Slot name when this path addresses a scoped-slot bucket.
    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for BindingPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BindingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A `|>`-marked binding. Keeps the verbatim text for literal passthrough
/// and compiles the body at most once, on first evaluation.
#[derive(Clone)]
pub struct Expression {
    raw: String,
    source: String,
    compiled: Rc<OnceCell<Result<Rc<CompiledExpression>>>>,
}

impl Expression {
    pub fn new(raw: &str) -> Self {
        let source = raw
            .trim_start()
            .strip_prefix(EXPRESSION_MARKER)
            .unwrap_or(raw)
            .trim()
            .to_string();
        Self {
            raw: raw.to_string(),
            source,
            compiled: Rc::new(OnceCell::new()),
        }
    }

    /// The marked string exactly as written in the schema.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The expression text without the marker.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn compiled(&self) -> Result<Rc<CompiledExpression>> {
        self.compiled
            .get_or_init(|| sandbox::compile(&self.source).map(Rc::new))
            .clone()
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.raw).finish()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bindable {
    Literal(Value),
    Path(BindingPath),
    Expression(Expression),
}

impl Bindable {
    /// Classify the value of a `:`-marked schema key.
    pub fn bound(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) if s.trim_start().starts_with(EXPRESSION_MARKER) => {
                Ok(Bindable::Expression(Expression::new(s)))
            }
            serde_json::Value::String(s) => Ok(Bindable::Path(BindingPath::parse(s)?)),
            other => Ok(Bindable::Literal(Value::from(other))),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Bindable::Literal(value.into())
    }
}

/// Splits a possibly-marked key into `(name, bound)`.
pub fn split_marker(key: &str) -> (&str, bool) {
    match key.strip_prefix(BINDING_MARKER) {
        Some(name) => (name, true),
        None => (key, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_namespace_path() {
        let path = BindingPath::parse("parent.user.name").unwrap();
        assert_eq!(path.namespace(), "parent");
        assert_eq!(path.slot(), None);
        assert_eq!(path.keys(), &["user".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_slot_path() {
        let path = BindingPath::parse("root#default.scopedData").unwrap();
        assert_eq!(path.namespace(), "root");
        assert_eq!(path.slot(), Some("default"));
        assert_eq!(path.keys(), &["scopedData".to_string()]);
    }

    #[test]
    fn test_loop_key_is_addressable() {
        let path = BindingPath::parse("child.$for.index").unwrap();
        assert_eq!(path.keys(), &["$for".to_string(), "index".to_string()]);
    }

    #[test]
    fn test_bare_namespace_has_no_keys() {
        let path = BindingPath::parse("child").unwrap();
        assert!(path.keys().is_empty());
    }

    #[test]
    fn test_malformed_paths_are_rejected() {
        for raw in ["", ".key", "ns..key", "ns.", "1ns.key", "ns#.key"] {
            assert!(
                matches!(BindingPath::parse(raw), Err(Error::InvalidBindingPath { .. })),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_bound_value_classification() {
        assert!(matches!(
            Bindable::bound(&json!("|> \"Test\"")).unwrap(),
            Bindable::Expression(_)
        ));
        assert!(matches!(
            Bindable::bound(&json!("root.loopable")).unwrap(),
            Bindable::Path(_)
        ));
        assert_eq!(
            Bindable::bound(&json!(false)).unwrap(),
            Bindable::Literal(Value::Bool(false))
        );
    }

    #[test]
    fn test_expression_keeps_raw_text() {
        let expr = Expression::new("|> \"Test\"");
        assert_eq!(expr.raw(), "|> \"Test\"");
        assert_eq!(expr.source(), "\"Test\"");
    }

    #[test]
    fn test_split_marker() {
        assert_eq!(split_marker(":text"), ("text", true));
        assert_eq!(split_marker("text"), ("text", false));
    }
}
