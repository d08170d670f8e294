// Skeleton AST for pattern decoding
// Classes and methods live in the registry; the tree below them (fields,
// statements, expressions) is owned by the class or method that declares it.

pub mod source_gen;
pub use source_gen::{render_class, render_method, render_template, ToSource};


use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::registry::{ClassId, MethodId};

/// Binary operators that can appear in skeleton code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    And,
    Or,
    Add,
    Sub,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Ge => ">=",
            BinOp::Gt => ">",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Add => "+",
            BinOp::Sub => "-",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(BinOp::Lt),
            "<=" => Ok(BinOp::Le),
            "==" => Ok(BinOp::Eq),
            "!=" => Ok(BinOp::Ne),
            ">=" => Ok(BinOp::Ge),
            ">" => Ok(BinOp::Gt),
            "&&" => Ok(BinOp::And),
            "||" => Ok(BinOp::Or),
            "+" => Ok(BinOp::Add),
            "-" => Ok(BinOp::Sub),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

/// `@Name(exps...)` placeholder left by the skeleton builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub exps: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Literal),
    Id(String),

    // recv.name
    Field {
        recv: Box<Expression>,
        name: String,
    },
    // callee(args...); method calls use a Field callee
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    New {
        ty: String,
        args: Vec<Expression>,
    },
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Cast {
        ty: String,
        expr: Box<Expression>,
    },
    Anno(Annotation),
}

impl Expression {
    pub fn id(name: impl Into<String>) -> Self {
        Expression::Id(name.into())
    }

    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    pub fn bool(value: bool) -> Self {
        Expression::Literal(Literal::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Expression::Literal(Literal::Int(value))
    }

    pub fn field(recv: Expression, name: impl Into<String>) -> Self {
        Expression::Field {
            recv: Box::new(recv),
            name: name.into(),
        }
    }

    pub fn call(callee: Expression, args: Vec<Expression>) -> Self {
        Expression::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `recv.method(args...)`
    pub fn method_call(recv: Expression, method: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::call(Self::field(recv, method), args)
    }

    pub fn binary(op: BinOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cast(ty: impl Into<String>, expr: Expression) -> Self {
        Expression::Cast {
            ty: ty.into(),
            expr: Box::new(expr),
        }
    }

    pub fn anno(name: impl Into<String>, exps: Vec<Expression>) -> Self {
        Expression::Anno(Annotation {
            name: name.into(),
            exps,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Expression::Literal(Literal::Null))
    }

    /// Last component of a dotted path: `a.b.c` -> `c`, `a.getDate()` -> `getDate`
    pub fn trailing_name(&self) -> Option<&str> {
        match self {
            Expression::Id(name) => Some(name),
            Expression::Field { name, .. } => Some(name),
            Expression::Call { callee, .. } => callee.trailing_name(),
            Expression::Cast { expr, .. } => expr.trailing_name(),
            _ => None,
        }
    }

    /// Receiver and method name of a `recv.method(...)` call
    pub fn as_method_call(&self) -> Option<(&Expression, &str, &[Expression])> {
        match self {
            Expression::Call { callee, args } => match callee.as_ref() {
                Expression::Field { recv, name } => Some((recv, name, args)),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Expr(Expression),
    /// `ty lhs = rhs;` when `ty` is present, plain `lhs = rhs;` otherwise
    Assign {
        ty: Option<String>,
        lhs: Expression,
        rhs: Expression,
    },
    If {
        cond: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    /// `for (ty var : iter) { body }`
    For {
        ty: String,
        var: String,
        iter: Expression,
        body: Vec<Statement>,
    },
    While {
        cond: Expression,
        body: Vec<Statement>,
    },
    Return(Option<Expression>),
}

impl Statement {
    pub fn declare(ty: impl Into<String>, name: impl Into<String>, rhs: Expression) -> Self {
        Statement::Assign {
            ty: Some(ty.into()),
            lhs: Expression::Id(name.into()),
            rhs,
        }
    }

    pub fn assign(lhs: Expression, rhs: Expression) -> Self {
        Statement::Assign { ty: None, lhs, rhs }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub ty: String,
    pub name: String,
}

impl Param {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
        }
    }
}

/// Names of the formals whose declared type is one of `types`
pub fn find_formals<'a>(params: &'a [Param], types: &[&str]) -> Vec<&'a str> {
    params
        .iter()
        .filter(|p| types.contains(&p.ty.as_str()))
        .map(|p| p.name.as_str())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub ty: String,
    pub name: String,
    #[serde(default)]
    pub init: Option<Expression>,
}

impl Field {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            init: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    /// Declaring class
    pub clazz: ClassId,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "void")]
    pub ret_ty: String,
    /// Constructor
    #[serde(default)]
    pub is_init: bool,
    #[serde(default)]
    pub body: Vec<Statement>,
}

fn void() -> String {
    "void".to_string()
}

impl Method {
    pub fn param_types(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.ty.as_str()).collect()
    }
}

/// Aux-only data: the generic Event class and the generic handle method
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuxDispatcher {
    pub event: ClassId,
    pub handle: MethodId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clazz {
    pub name: String,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub sup: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub methods: Vec<MethodId>,
    #[serde(default)]
    pub aux: Option<AuxDispatcher>,
    /// Name of the observer collection once this class plays Subject
    #[serde(default)]
    pub collection_field: Option<String>,
}

impl Clazz {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_interface: false,
            sup: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            aux: None,
            collection_field: None,
        }
    }

    pub fn lower(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Top-level skeleton: classes to emit plus the Aux names to decode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub classes: Vec<ClassId>,
    #[serde(default)]
    pub obs_auxs: Vec<String>,
}
