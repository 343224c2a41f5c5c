//! Interpreter faults.
//!
//! Every fault is raised synchronously to the caller of `build`, `render`,
//! `get` or a listener invocation. Nothing here is recovered from internally:
//! a missing namespace or key is a schema-authoring defect and is surfaced
//! as such.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Namespace {namespace} does not exist")]
    NamespaceNotFound { namespace: String },

    #[error("Key {key} does not exist in namespace {namespace}")]
    KeyNotFound { namespace: String, key: String },

    #[error("Scoped slot {namespace}#{slot} does not exist")]
    SlotContextNotFound { namespace: String, slot: String },

    #[error("{identifier} is not defined")]
    ExpressionReferenceFault { identifier: String },

    #[error("Invalid expression syntax in '{expression}': {message}")]
    ExpressionSyntax { expression: String, message: String },

    #[error("Unsupported expression construct: {construct}")]
    UnsupportedExpression { construct: String },

    #[error("Type error: {message}")]
    ExpressionType { message: String },

    #[error("{what} is not a function")]
    NotCallable { what: String },

    #[error("Invalid binding path '{path}'")]
    InvalidBindingPath { path: String },

    #[error("Loop source must be an array or an object, found {found}")]
    InvalidLoopSource { found: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Scope was released by a later render pass")]
    ScopeReleased,

    #[error("JSON error: {0}")]
    Json(String),
}

impl Error {
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::ExpressionType {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
