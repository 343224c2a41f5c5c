//! oxc AST -> sandbox IR.
//!
//! Only the subset the sandbox evaluates is lowered. Everything else is
//! rejected here, at compile time, with the offending source text.

use std::rc::Rc;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentTarget, BindingPattern, Expression, ObjectPropertyKind,
    PropertyKey, Statement,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use oxc_syntax::operator::{AssignmentOperator, BinaryOperator, LogicalOperator, UnaryOperator};

use super::ir::{
    AssignOp, BinaryOp, Expr, Lambda, LambdaBody, LogicalOp, Property, Stmt, Target, UnaryOp,
};
use super::references;
use crate::error::{Error, Result};
use crate::value::{format_number, Value};

/// Parses `source` as a single expression. Returns the lowered tree and the
/// free identifiers it references.
pub fn parse(source: &str) -> Result<(Expr, Vec<String>)> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);

    let parsed = Parser::new(&allocator, source, source_type).parse_expression();
    match parsed {
        Ok(expr) => {
            let dependencies = references::free_identifiers(&expr);
            let lowered = Lowerer { source }.expression(&expr)?;
            Ok((lowered, dependencies))
        }
        Err(errors) => Err(Error::ExpressionSyntax {
            expression: source.to_string(),
            message: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        }),
    }
}

struct Lowerer<'s> {
    source: &'s str,
}

impl<'s> Lowerer<'s> {
    fn unsupported(&self, node: &impl GetSpan) -> Error {
        let span = node.span();
        let text = self
            .source
            .get(span.start as usize..span.end as usize)
            .unwrap_or(self.source);
        Error::UnsupportedExpression {
            construct: text.to_string(),
        }
    }

    fn boxed(&self, expr: &Expression<'_>) -> Result<Box<Expr>> {
        Ok(Box::new(self.expression(expr)?))
    }

    fn expression(&self, expr: &Expression<'_>) -> Result<Expr> {
        match expr {
            Expression::BooleanLiteral(lit) => Ok(Expr::Literal(Value::Bool(lit.value))),
            Expression::NullLiteral(_) => Ok(Expr::Literal(Value::Null)),
            Expression::NumericLiteral(lit) => Ok(Expr::Literal(Value::Number(lit.value))),
            Expression::StringLiteral(lit) => Ok(Expr::Literal(Value::String(lit.value.to_string()))),
            Expression::TemplateLiteral(tpl) => Ok(Expr::Template {
                quasis: tpl
                    .quasis
                    .iter()
                    .map(|q| {
                        q.value
                            .cooked
                            .as_ref()
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| q.value.raw.to_string())
                    })
                    .collect(),
                expressions: tpl
                    .expressions
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<Result<_>>()?,
            }),
            Expression::Identifier(id) => Ok(Expr::Identifier(id.name.to_string())),
            Expression::StaticMemberExpression(member) => Ok(Expr::Member {
                object: self.boxed(&member.object)?,
                property: Property::Static(member.property.name.to_string()),
            }),
            Expression::ComputedMemberExpression(member) => Ok(Expr::Member {
                object: self.boxed(&member.object)?,
                property: Property::Computed(self.boxed(&member.expression)?),
            }),
            Expression::ArrayExpression(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    let item = element
                        .as_expression()
                        .ok_or_else(|| self.unsupported(element))?;
                    items.push(self.expression(item)?);
                }
                Ok(Expr::Array(items))
            }
            Expression::ObjectExpression(object) => {
                let mut entries = Vec::with_capacity(object.properties.len());
                for prop in &object.properties {
                    match prop {
                        ObjectPropertyKind::ObjectProperty(p) if !p.computed => {
                            let key = match &p.key {
                                PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                                PropertyKey::StringLiteral(lit) => lit.value.to_string(),
                                PropertyKey::NumericLiteral(lit) => format_number(lit.value),
                                other => return Err(self.unsupported(other)),
                            };
                            entries.push((key, self.expression(&p.value)?));
                        }
                        other => return Err(self.unsupported(other)),
                    }
                }
                Ok(Expr::Object(entries))
            }
            Expression::UnaryExpression(unary) => {
                let op = match unary.operator {
                    UnaryOperator::LogicalNot => UnaryOp::Not,
                    UnaryOperator::UnaryNegation => UnaryOp::Negate,
                    UnaryOperator::UnaryPlus => UnaryOp::Plus,
                    UnaryOperator::Typeof => UnaryOp::Typeof,
                    _ => return Err(self.unsupported(expr)),
                };
                Ok(Expr::Unary {
                    op,
                    argument: self.boxed(&unary.argument)?,
                })
            }
            Expression::BinaryExpression(binary) => {
                let op = binary_op(binary.operator).ok_or_else(|| self.unsupported(expr))?;
                Ok(Expr::Binary {
                    op,
                    left: self.boxed(&binary.left)?,
                    right: self.boxed(&binary.right)?,
                })
            }
            Expression::LogicalExpression(logical) => Ok(Expr::Logical {
                op: logical_op(logical.operator),
                left: self.boxed(&logical.left)?,
                right: self.boxed(&logical.right)?,
            }),
            Expression::ConditionalExpression(cond) => Ok(Expr::Conditional {
                test: self.boxed(&cond.test)?,
                consequent: self.boxed(&cond.consequent)?,
                alternate: self.boxed(&cond.alternate)?,
            }),
            Expression::AssignmentExpression(assign) => {
                let op = match assign.operator {
                    AssignmentOperator::Assign => AssignOp::Assign,
                    AssignmentOperator::Addition => AssignOp::Arithmetic(BinaryOp::Add),
                    AssignmentOperator::Subtraction => AssignOp::Arithmetic(BinaryOp::Sub),
                    AssignmentOperator::Multiplication => AssignOp::Arithmetic(BinaryOp::Mul),
                    AssignmentOperator::Division => AssignOp::Arithmetic(BinaryOp::Div),
                    AssignmentOperator::Remainder => AssignOp::Arithmetic(BinaryOp::Rem),
                    AssignmentOperator::LogicalAnd => AssignOp::Logical(LogicalOp::And),
                    AssignmentOperator::LogicalOr => AssignOp::Logical(LogicalOp::Or),
                    AssignmentOperator::LogicalNullish => AssignOp::Logical(LogicalOp::Coalesce),
                    _ => return Err(self.unsupported(expr)),
                };
                let target = match &assign.left {
                    AssignmentTarget::AssignmentTargetIdentifier(id) => {
                        Target::Identifier(id.name.to_string())
                    }
                    AssignmentTarget::StaticMemberExpression(member) => Target::Member {
                        object: self.boxed(&member.object)?,
                        property: Property::Static(member.property.name.to_string()),
                    },
                    AssignmentTarget::ComputedMemberExpression(member) => Target::Member {
                        object: self.boxed(&member.object)?,
                        property: Property::Computed(self.boxed(&member.expression)?),
                    },
                    other => return Err(self.unsupported(other)),
                };
                Ok(Expr::Assign {
                    op,
                    target,
                    value: self.boxed(&assign.right)?,
                })
            }
            Expression::CallExpression(call) => {
                let mut arguments = Vec::with_capacity(call.arguments.len());
                for arg in &call.arguments {
                    let arg_expr = arg.as_expression().ok_or_else(|| self.unsupported(arg))?;
                    arguments.push(self.expression(arg_expr)?);
                }
                Ok(Expr::Call {
                    callee: self.boxed(&call.callee)?,
                    arguments,
                })
            }
            Expression::ArrowFunctionExpression(arrow) => self.arrow(arrow),
            Expression::ParenthesizedExpression(paren) => self.expression(&paren.expression),
            Expression::SequenceExpression(seq) => Ok(Expr::Sequence(
                seq.expressions
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<Result<_>>()?,
            )),
            _ => Err(self.unsupported(expr)),
        }
    }

    fn arrow(&self, arrow: &ArrowFunctionExpression<'_>) -> Result<Expr> {
        if arrow.r#async || arrow.params.rest.is_some() {
            return Err(self.unsupported(arrow));
        }

        let mut params = Vec::with_capacity(arrow.params.items.len());
        for param in &arrow.params.items {
            match &param.pattern {
                BindingPattern::BindingIdentifier(id) => params.push(id.name.to_string()),
                _ => return Err(self.unsupported(param)),
            }
        }

        let body = if arrow.expression {
            match arrow.body.statements.first() {
                Some(Statement::ExpressionStatement(stmt)) => {
                    LambdaBody::Expression(self.expression(&stmt.expression)?)
                }
                _ => return Err(self.unsupported(arrow)),
            }
        } else {
            LambdaBody::Block(self.statements(&arrow.body.statements)?)
        };

        Ok(Expr::Lambda(Rc::new(Lambda { params, body })))
    }

    fn statements(&self, stmts: &[Statement<'_>]) -> Result<Vec<Stmt>> {
        let mut out = Vec::new();
        for stmt in stmts {
            if let Some(lowered) = self.statement(stmt)? {
                out.push(lowered);
            }
        }
        Ok(out)
    }

    fn statement(&self, stmt: &Statement<'_>) -> Result<Option<Stmt>> {
        match stmt {
            Statement::EmptyStatement(_) => Ok(None),
            Statement::ExpressionStatement(s) => {
                Ok(Some(Stmt::Expression(self.expression(&s.expression)?)))
            }
            Statement::ReturnStatement(ret) => {
                let argument = match &ret.argument {
                    Some(arg) => Some(self.expression(arg)?),
                    None => None,
                };
                Ok(Some(Stmt::Return(argument)))
            }
            Statement::BlockStatement(block) => Ok(Some(Stmt::Block(self.statements(&block.body)?))),
            Statement::IfStatement(if_stmt) => {
                let consequent = self.statement(&if_stmt.consequent)?.into_iter().collect();
                let alternate = match &if_stmt.alternate {
                    Some(alt) => self.statement(alt)?.into_iter().collect(),
                    None => Vec::new(),
                };
                Ok(Some(Stmt::If {
                    test: self.expression(&if_stmt.test)?,
                    consequent,
                    alternate,
                }))
            }
            other => Err(self.unsupported(other)),
        }
    }
}

fn binary_op(op: BinaryOperator) -> Option<BinaryOp> {
    let lowered = match op {
        BinaryOperator::Addition => BinaryOp::Add,
        BinaryOperator::Subtraction => BinaryOp::Sub,
        BinaryOperator::Multiplication => BinaryOp::Mul,
        BinaryOperator::Division => BinaryOp::Div,
        BinaryOperator::Remainder => BinaryOp::Rem,
        BinaryOperator::Equality => BinaryOp::Eq,
        BinaryOperator::Inequality => BinaryOp::NotEq,
        BinaryOperator::StrictEquality => BinaryOp::StrictEq,
        BinaryOperator::StrictInequality => BinaryOp::StrictNotEq,
        BinaryOperator::LessThan => BinaryOp::Lt,
        BinaryOperator::LessEqualThan => BinaryOp::LtEq,
        BinaryOperator::GreaterThan => BinaryOp::Gt,
        BinaryOperator::GreaterEqualThan => BinaryOp::GtEq,
        _ => return None,
    };
    Some(lowered)
}

fn logical_op(op: LogicalOperator) -> LogicalOp {
    match op {
        LogicalOperator::And => LogicalOp::And,
        LogicalOperator::Or => LogicalOp::Or,
        LogicalOperator::Coalesce => LogicalOp::Coalesce,
    }
}
