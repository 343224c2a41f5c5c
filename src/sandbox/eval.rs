//! Tree-walking evaluator over the sandbox IR.
//!
//! Identifier lookup order: lambda locals, sandbox globals, then namespaces
//! visible from the evaluating scope (nearest frame wins). Nothing else
//! exists: there is no ambient global object to read or mutate.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use super::ir::{
    AssignOp, BinaryOp, Expr, Lambda, LambdaBody, LogicalOp, Property, Stmt, Target, UnaryOp,
};
use super::references::sandbox_global;
use crate::error::{Error, Result};
use crate::scope::{ScopeId, StoreHandle};
use crate::value::{format_number, Callable, Map, Value};

type Locals = Rc<RefCell<IndexMap<String, Value>>>;

enum Flow {
    Normal,
    Return(Value),
}

#[derive(Clone)]
pub(crate) struct Env {
    store: StoreHandle,
    scope: ScopeId,
    locals: Vec<Locals>,
}

impl Env {
    pub(crate) fn new(store: &StoreHandle, scope: ScopeId) -> Self {
        Self {
            store: store.clone(),
            scope,
            locals: Vec::new(),
        }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Identifier(name) => self.lookup(name),
            Expr::Template {
                quasis,
                expressions,
            } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = expressions.get(i) {
                        out.push_str(&concat_text(&self.eval(expr)?));
                    }
                }
                Ok(Value::String(out))
            }
            Expr::Member { object, property } => {
                let target = self.eval(object)?;
                let key = self.property_key(property)?;
                read_member(&target, &key)
            }
            Expr::Array(items) => Ok(Value::Array(
                items.iter().map(|e| self.eval(e)).collect::<Result<_>>()?,
            )),
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Unary { op, argument } => {
                let value = self.eval(argument)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Negate => Value::Number(-to_number(&value)),
                    UnaryOp::Plus => Value::Number(to_number(&value)),
                    UnaryOp::Typeof => Value::from(type_of(&value)),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                if short_circuits(*op, &left) {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign { op, target, value } => self.assign(*op, target, value),
            Expr::Call { callee, arguments } => {
                let function = self.eval(callee)?;
                let args = arguments
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>>>()?;
                match function {
                    Value::Function(callable) => callable.call(&args),
                    _ => Err(Error::NotCallable {
                        what: callee.describe(),
                    }),
                }
            }
            Expr::Lambda(lambda) => Ok(self.closure(lambda)),
            Expr::Sequence(exprs) => {
                let mut last = Value::Null;
                for expr in exprs {
                    last = self.eval(expr)?;
                }
                Ok(last)
            }
        }
    }

    fn local_frame(&self, name: &str) -> Option<&Locals> {
        self.locals
            .iter()
            .rev()
            .find(|frame| frame.borrow().contains_key(name))
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(frame) = self.local_frame(name) {
            if let Some(value) = frame.borrow().get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(value) = sandbox_global(name) {
            return Ok(value);
        }
        trace!(identifier = name, "Resolving namespace identifier");
        self.store
            .namespace_data(self.scope, name)?
            .ok_or_else(|| Error::ExpressionReferenceFault {
                identifier: name.to_string(),
            })
    }

    fn property_key(&self, property: &Property) -> Result<String> {
        match property {
            Property::Static(name) => Ok(name.clone()),
            Property::Computed(expr) => match self.eval(expr)? {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(format_number(n)),
                Value::Bool(b) => Ok(b.to_string()),
                other => Err(Error::type_error(format!(
                    "cannot use {} as a property key",
                    other.type_name()
                ))),
            },
        }
    }

    /// `root.a.b` target chain as `(root, [a, b])`.
    fn target_chain(&self, expr: &Expr) -> Result<(String, Vec<String>)> {
        match expr {
            Expr::Identifier(name) => Ok((name.clone(), Vec::new())),
            Expr::Member { object, property } => {
                let (root, mut keys) = self.target_chain(object)?;
                keys.push(self.property_key(property)?);
                Ok((root, keys))
            }
            other => Err(Error::UnsupportedExpression {
                construct: format!("assignment to {}", other.describe()),
            }),
        }
    }

    /// Value to store for a (possibly compound) assignment, or `None` when a
    /// logical assignment short-circuits.
    fn combine(
        &self,
        op: AssignOp,
        current: &dyn Fn() -> Result<Value>,
        rhs: &Expr,
    ) -> Result<Option<Value>> {
        match op {
            AssignOp::Assign => Ok(Some(self.eval(rhs)?)),
            AssignOp::Arithmetic(bin) => {
                let current = current()?;
                Ok(Some(binary(bin, &current, &self.eval(rhs)?)))
            }
            AssignOp::Logical(logical) => {
                let current = current()?;
                if short_circuits(logical, &current) {
                    Ok(None)
                } else {
                    Ok(Some(self.eval(rhs)?))
                }
            }
        }
    }

    fn assign(&self, op: AssignOp, target: &Target, rhs: &Expr) -> Result<Value> {
        let (root, keys) = match target {
            Target::Identifier(name) => (name.clone(), Vec::new()),
            Target::Member { object, property } => {
                let (root, mut keys) = self.target_chain(object)?;
                keys.push(self.property_key(property)?);
                (root, keys)
            }
        };

        if let Some(frame) = self.local_frame(&root).cloned() {
            let current = || {
                let value = frame.borrow().get(&root).cloned().unwrap_or_default();
                keys.iter().try_fold(value, |acc, key| read_member(&acc, key))
            };
            let Some(value) = self.combine(op, &current, rhs)? else {
                return current();
            };
            if let Some(slot) = frame.borrow_mut().get_mut(&root) {
                write_member(slot, &keys, value.clone())?;
            }
            return Ok(value);
        }

        if keys.is_empty() {
            return match self.store.namespace_data(self.scope, &root)? {
                Some(_) => Err(Error::type_error(format!(
                    "cannot reassign namespace `{}`",
                    root
                ))),
                None => Err(Error::ExpressionReferenceFault { identifier: root }),
            };
        }

        let current = || {
            let data = self.lookup(&root)?;
            keys.iter().try_fold(data, |acc, key| read_member(&acc, key))
        };
        match self.combine(op, &current, rhs)? {
            Some(value) => {
                if self.store.namespace_data(self.scope, &root)?.is_none() {
                    return Err(Error::ExpressionReferenceFault { identifier: root });
                }
                trace!(namespace = %root, keys = ?keys, "Expression write");
                self.store.write(self.scope, &root, &keys, value.clone())?;
                Ok(value)
            }
            None => current(),
        }
    }

    fn closure(&self, lambda: &Rc<Lambda>) -> Value {
        let env = self.clone();
        let lambda = Rc::clone(lambda);
        Value::Function(Callable::new("lambda", move |args| env.invoke(&lambda, args)))
    }

    fn invoke(&self, lambda: &Lambda, args: &[Value]) -> Result<Value> {
        let frame: IndexMap<String, Value> = lambda
            .params
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), args.get(i).cloned().unwrap_or_default()))
            .collect();
        let mut env = self.clone();
        env.locals.push(Rc::new(RefCell::new(frame)));

        match &lambda.body {
            LambdaBody::Expression(expr) => env.eval(expr),
            LambdaBody::Block(stmts) => match env.exec(stmts)? {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Null),
            },
        }
    }

    fn exec(&self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            let flow = match stmt {
                Stmt::Expression(expr) => {
                    self.eval(expr)?;
                    Flow::Normal
                }
                Stmt::Return(expr) => {
                    let value = match expr {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Null,
                    };
                    Flow::Return(value)
                }
                Stmt::If {
                    test,
                    consequent,
                    alternate,
                } => {
                    if self.eval(test)?.truthy() {
                        self.exec(consequent)?
                    } else {
                        self.exec(alternate)?
                    }
                }
                Stmt::Block(body) => self.exec(body)?,
            };
            if let Flow::Return(_) = flow {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }
}

fn read_member(target: &Value, key: &str) -> Result<Value> {
    match target {
        Value::Null => Err(Error::type_error(format!(
            "cannot read properties of null (reading '{}')",
            key
        ))),
        Value::String(s) if key == "length" => Ok(Value::from(s.chars().count())),
        Value::Array(items) if key == "length" => Ok(Value::from(items.len())),
        other => Ok(other.member(key).cloned().unwrap_or_default()),
    }
}

fn write_member(root: &mut Value, keys: &[String], value: Value) -> Result<()> {
    let Some((last, parents)) = keys.split_last() else {
        *root = value;
        return Ok(());
    };
    let mut target = root;
    for key in parents {
        target = target.member_mut(key).ok_or_else(|| {
            Error::type_error(format!("cannot set properties of undefined (setting '{}')", key))
        })?;
    }
    match target {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::type_error(format!("index {} is out of bounds", last))),
        },
        other => Err(Error::type_error(format!(
            "cannot set member `{}` on {}",
            last,
            other.type_name()
        ))),
    }
}

fn short_circuits(op: LogicalOp, left: &Value) -> bool {
    match op {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Coalesce => !left.is_null(),
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "undefined",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Function(_) => "function",
        Value::Array(_) | Value::Object(_) => "object",
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        _ => f64::NAN,
    }
}

/// String conversion used by `+` and template literals.
fn concat_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        other => other.to_text(),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => to_number(left) == to_number(right),
        _ => left == right,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::String(format!("{}{}", concat_text(left), concat_text(right)))
            }
            _ => Value::Number(to_number(left) + to_number(right)),
        },
        BinaryOp::Sub => Value::Number(to_number(left) - to_number(right)),
        BinaryOp::Mul => Value::Number(to_number(left) * to_number(right)),
        BinaryOp::Div => Value::Number(to_number(left) / to_number(right)),
        BinaryOp::Rem => Value::Number(to_number(left) % to_number(right)),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNotEq => Value::Bool(left != right),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => to_number(left).partial_cmp(&to_number(right)),
            };
            let result = match ordering {
                None => false,
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::LtEq => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            };
            Value::Bool(result)
        }
    }
}
