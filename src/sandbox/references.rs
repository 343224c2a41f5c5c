use std::collections::HashSet;

use oxc_ast::ast::{ArrowFunctionExpression, BindingIdentifier, Expression, IdentifierReference};
use oxc_ast_visit::Visit;

use crate::value::Value;

/// Identifiers the sandbox resolves without consulting the scope store.
pub fn sandbox_global(name: &str) -> Option<Value> {
    match name {
        "undefined" => Some(Value::Null),
        "NaN" => Some(Value::Number(f64::NAN)),
        "Infinity" => Some(Value::Number(f64::INFINITY)),
        _ => None,
    }
}

/// Namespaces an expression reads or writes: every identifier reference
/// that is neither bound by an enclosing lambda parameter nor a sandbox
/// global. First-use order, deduplicated.
pub fn free_identifiers(expr: &Expression<'_>) -> Vec<String> {
    let mut collector = ReferenceCollector {
        references: vec![],
        scopes: vec![],
    };
    collector.visit_expression(expr);

    let mut seen = HashSet::new();
    collector
        .references
        .into_iter()
        .filter(|ident| sandbox_global(ident).is_none() && seen.insert(ident.clone()))
        .collect()
}

struct ReferenceCollector {
    references: Vec<String>,
    /// Parameter names of the lambdas enclosing the current node.
    scopes: Vec<HashSet<String>>,
}

impl<'a> Visit<'a> for ReferenceCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        let name = ident.name.as_str();
        if !self.scopes.iter().any(|scope| scope.contains(name)) {
            self.references.push(name.to_string());
        }
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(ident.name.to_string());
        }
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.scopes.push(HashSet::new());
        oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
        self.scopes.pop();
    }
}
