//! Owned expression tree the evaluator walks. Lowered once from the oxc AST
//! so compiled expressions outlive the parser arena.

use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Arithmetic(BinaryOp),
    Logical(LogicalOp),
}

#[derive(Debug, Clone)]
pub enum Property {
    Static(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Target {
    Identifier(String),
    Member { object: Box<Expr>, property: Property },
}

#[derive(Debug)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: LambdaBody,
}

#[derive(Debug)]
pub enum LambdaBody {
    Expression(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Identifier(String),
    Template {
        quasis: Vec<String>,
        expressions: Vec<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Property,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Target,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Lambda(Rc<Lambda>),
    Sequence(Vec<Expr>),
}

impl Expr {
    /// Short source-like label used in `NotCallable` faults.
    pub fn describe(&self) -> String {
        match self {
            Expr::Identifier(name) => name.clone(),
            Expr::Member {
                object,
                property: Property::Static(name),
            } => format!("{}.{}", object.describe(), name),
            Expr::Member { object, .. } => format!("{}[...]", object.describe()),
            Expr::Literal(value) => value.to_text(),
            Expr::Call { callee, .. } => format!("{}(...)", callee.describe()),
            _ => "expression".to_string(),
        }
    }
}
