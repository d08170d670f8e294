// Source generation from the skeleton AST
// Renders Java-like text. Statements render on a single line; classes and
// methods render as indented blocks.

use super::*;
use crate::registry::{ClassId, MethodId, Program, Registry};

/// Trait for types that can generate their source code representation
pub trait ToSource {
    fn to_source(&self) -> String;
}

fn join_sources<T: ToSource>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_source())
        .collect::<Vec<_>>()
        .join(sep)
}

fn block(stmts: &[Statement]) -> String {
    if stmts.is_empty() {
        "{ }".to_string()
    } else {
        format!("{{ {} }}", join_sources(stmts, " "))
    }
}

// Parenthesize operands that would otherwise bind differently
fn operand(expr: &Expression) -> String {
    match expr {
        Expression::Binary { .. } | Expression::Cast { .. } => format!("({})", expr.to_source()),
        _ => expr.to_source(),
    }
}

impl ToSource for Literal {
    fn to_source(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(n) => n.to_string(),
            Literal::Str(s) => format!("\"{}\"", escape_string(s)),
        }
    }
}

impl ToSource for Expression {
    fn to_source(&self) -> String {
        match self {
            Expression::Literal(lit) => lit.to_source(),
            Expression::Id(name) => name.clone(),
            Expression::Field { recv, name } => format!("{}.{}", operand(recv), name),
            Expression::Call { callee, args } => {
                format!("{}({})", callee.to_source(), join_sources(args, ", "))
            }
            Expression::New { ty, args } => format!("new {}({})", ty, join_sources(args, ", ")),
            Expression::Binary { op, left, right } => {
                format!("{} {} {}", operand(left), op, operand(right))
            }
            Expression::Cast { ty, expr } => format!("({}) {}", ty, operand(expr)),
            Expression::Anno(anno) => format!("@{}({})", anno.name, join_sources(&anno.exps, ", ")),
        }
    }
}

impl ToSource for Statement {
    fn to_source(&self) -> String {
        match self {
            Statement::Expr(expr) => format!("{};", expr.to_source()),
            Statement::Assign { ty, lhs, rhs } => match ty {
                Some(ty) => format!("{} {} = {};", ty, lhs.to_source(), rhs.to_source()),
                None => format!("{} = {};", lhs.to_source(), rhs.to_source()),
            },
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut result = format!("if ({}) {}", cond.to_source(), block(then_branch));
                if !else_branch.is_empty() {
                    result.push_str(&format!(" else {}", block(else_branch)));
                }
                result
            }
            Statement::For { ty, var, iter, body } => {
                format!("for ({} {} : {}) {}", ty, var, iter.to_source(), block(body))
            }
            Statement::While { cond, body } => {
                format!("while ({}) {}", cond.to_source(), block(body))
            }
            Statement::Return(Some(expr)) => format!("return {};", expr.to_source()),
            Statement::Return(None) => "return;".to_string(),
        }
    }
}

impl ToSource for Param {
    fn to_source(&self) -> String {
        format!("{} {}", self.ty, self.name)
    }
}

impl ToSource for Field {
    fn to_source(&self) -> String {
        match &self.init {
            Some(init) => format!("{} {} = {};", self.ty, self.name, init.to_source()),
            None => format!("{} {};", self.ty, self.name),
        }
    }
}

pub fn render_method(registry: &Registry, id: MethodId) -> String {
    let method = registry.method(id);
    let params = join_sources(&method.params, ", ");
    let mut result = if method.is_init {
        format!("  {}({}) {{\n", registry.class(method.clazz).name, params)
    } else {
        format!("  {} {}({}) {{\n", method.ret_ty, method.name, params)
    };
    for stmt in &method.body {
        result.push_str(&format!("    {}\n", stmt.to_source()));
    }
    result.push_str("  }\n");
    result
}

pub fn render_class(registry: &Registry, id: ClassId) -> String {
    let clazz = registry.class(id);
    let kind = if clazz.is_interface { "interface" } else { "class" };
    let mut result = format!("{} {}", kind, clazz.name);
    if let Some(sup) = &clazz.sup {
        result.push_str(&format!(" extends {sup}"));
    }
    if !clazz.interfaces.is_empty() {
        result.push_str(&format!(" implements {}", clazz.interfaces.join(", ")));
    }
    result.push_str(" {\n");
    for field in &clazz.fields {
        result.push_str(&format!("  {}\n", field.to_source()));
    }
    for method in &clazz.methods {
        result.push_str(&render_method(registry, *method));
    }
    result.push_str("}\n");
    result
}

/// Render every class the template still lists, in template order
pub fn render_template(program: &Program) -> String {
    program
        .template
        .classes
        .iter()
        .map(|id| render_class(&program.registry, *id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '"' => r#"\""#.to_string(),
            '\\' => r"\\".to_string(),
            '\n' => r"\n".to_string(),
            '\r' => r"\r".to_string(),
            '\t' => r"\t".to_string(),
            c => c.to_string(),
        })
        .collect()
}
