//! Expression sandbox.
//!
//! `|>`-marked bindings are parsed with oxc, lowered to a small owned IR and
//! evaluated against the namespaces visible from the node being built.
//! Evaluation is gated by [`InterpreterConfig::enable_expression_execution`]:
//! when it is off the marked string is returned verbatim and never parsed.

mod eval;
mod ir;
mod lower;
mod references;

use tracing::trace;

use crate::binding::Expression;
use crate::config::InterpreterConfig;
use crate::error::Result;
use crate::scope::{ScopeId, StoreHandle};
use crate::value::Value;

pub use references::sandbox_global;

/// A parsed and lowered expression.
#[derive(Debug)]
pub struct CompiledExpression {
    source: String,
    expr: ir::Expr,
    dependencies: Vec<String>,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Namespace identifiers the expression reads or writes.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn evaluate(&self, store: &StoreHandle, scope: ScopeId) -> Result<Value> {
        trace!(expression = %self.source, "Evaluating expression");
        eval::Env::new(store, scope).eval(&self.expr)
    }
}

pub fn compile(source: &str) -> Result<CompiledExpression> {
    let (expr, dependencies) = lower::parse(source)?;
    Ok(CompiledExpression {
        source: source.to_string(),
        expr,
        dependencies,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sandbox {
    enabled: bool,
}

impl Sandbox {
    pub fn new(config: &InterpreterConfig) -> Self {
        Self {
            enabled: config.enable_expression_execution,
        }
    }

    pub fn evaluate(
        &self,
        expression: &Expression,
        store: &StoreHandle,
        scope: ScopeId,
    ) -> Result<Value> {
        if !self.enabled {
            return Ok(Value::String(expression.raw().to_string()));
        }
        expression.compiled()?.evaluate(store, scope)
    }
}
