/*!
# Rewrite Rules

The hook trait a decoder implements, plus per-node-kind statistics.
*/

use std::fmt;

use crate::ast::{Clazz, Expression, Field, Statement};
use crate::errors::Result;

use super::TransformationContext;

/// Per-node-kind rewrite hooks
///
/// Every hook receives a node whose children have already been rewritten and
/// returns its replacement. Defaults return the node unchanged.
pub trait NodeRewriter {
    /// Human-readable name for this rewriter
    fn name(&self) -> &'static str;

    fn visit_class(&mut self, clazz: &Clazz, context: &TransformationContext) -> Result<()> {
        let _ = (clazz, context);
        Ok(())
    }

    fn visit_field(&mut self, field: Field, context: &TransformationContext) -> Result<Vec<Field>> {
        let _ = context;
        Ok(vec![field])
    }

    /// Called with a method's already rewritten body
    fn visit_method(
        &mut self,
        body: Vec<Statement>,
        context: &TransformationContext,
    ) -> Result<Vec<Statement>> {
        let _ = context;
        Ok(body)
    }

    fn visit_statement(
        &mut self,
        stmt: Statement,
        context: &TransformationContext,
    ) -> Result<Vec<Statement>> {
        let _ = context;
        Ok(vec![stmt])
    }

    fn visit_expression(
        &mut self,
        expr: Expression,
        context: &TransformationContext,
    ) -> Result<Expression> {
        let _ = context;
        Ok(expr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Class,
    Field,
    Method,
    Statement,
    Expression,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Class => "class",
            NodeKind::Field => "field",
            NodeKind::Method => "method",
            NodeKind::Statement => "statement",
            NodeKind::Expression => "expression",
        };
        f.write_str(name)
    }
}

/// Visit statistics for one node kind
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleStats {
    pub applications: u64,
    pub transformations: u64,
    pub removals: u64,
}
