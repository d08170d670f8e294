/*!
# Tracer - Bottom-up Walker

Visits every class listed in a template. Within a method, expressions are
rewritten before the statement holding them and nested blocks before their
parent, so a parent rule always sees fully rewritten children.
*/

use std::collections::BTreeMap;

use tracing::trace;

use crate::ast::{Annotation, Expression, Statement, Template};
use crate::errors::{DecodeError, Result};
use crate::registry::Registry;

use super::rules::{NodeKind, NodeRewriter, RuleStats};
use super::TransformationContext;

pub struct Tracer {
    stats: BTreeMap<NodeKind, RuleStats>,
    max_depth: usize,
}

impl Tracer {
    pub fn new() -> Self {
        Self {
            stats: BTreeMap::new(),
            max_depth: 256,
        }
    }

    /// Set the maximum statement nesting the walker follows
    pub fn max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    /// Rewrite every class of the template in place
    pub fn walk<R: NodeRewriter>(
        &mut self,
        template: &Template,
        registry: &mut Registry,
        rewriter: &mut R,
    ) -> Result<TransformationSummary> {
        self.clear_stats();
        trace!("{}: walking {} classes", rewriter.name(), template.classes.len());

        for &class in &template.classes {
            // Fields and bodies are taken out while they are rewritten so the
            // rest of the registry stays readable through the context.
            let fields = std::mem::take(&mut registry.class_mut(class).fields);
            let fields = {
                let context = TransformationContext::new(registry, class)
                    .with_max_depth(self.max_depth);
                rewriter.visit_class(registry.class(class), &context)?;
                self.record(NodeKind::Class, true, 1);

                let mut rewritten = Vec::with_capacity(fields.len());
                for mut field in fields {
                    if let Some(init) = field.init.take() {
                        field.init = Some(self.walk_expression(init, rewriter, &context)?);
                    }
                    let before = field.clone();
                    let replaced = rewriter.visit_field(field, &context)?;
                    let changed = replaced.len() != 1 || replaced[0] != before;
                    self.record(NodeKind::Field, changed, replaced.len());
                    rewritten.extend(replaced);
                }
                rewritten
            };
            registry.class_mut(class).fields = fields;

            let methods = registry.class(class).methods.clone();
            for method in methods {
                let body = std::mem::take(&mut registry.method_mut(method).body);
                let body = {
                    let context = TransformationContext::new(registry, class)
                        .with_method(method)
                        .with_max_depth(self.max_depth);
                    let body = self.walk_statements(body, rewriter, &context)?;
                    let before_len = body.len();
                    let body = rewriter.visit_method(body, &context)?;
                    self.record(NodeKind::Method, body.len() != before_len, 1);
                    body
                };
                registry.method_mut(method).body = body;
            }
        }

        Ok(self.summary())
    }

    pub fn walk_statements<R: NodeRewriter>(
        &mut self,
        stmts: Vec<Statement>,
        rewriter: &mut R,
        context: &TransformationContext,
    ) -> Result<Vec<Statement>> {
        if context.at_max_depth() {
            return Err(DecodeError::structural(
                context.location(),
                format!("statement nesting exceeds {} levels", context.max_depth),
            ));
        }

        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let stmt = self.walk_statement_children(stmt, rewriter, context)?;
            let before = stmt.clone();
            let replaced = rewriter.visit_statement(stmt, context)?;
            let changed = replaced.len() != 1 || replaced[0] != before;
            self.record(NodeKind::Statement, changed, replaced.len());
            out.extend(replaced);
        }
        Ok(out)
    }

    fn walk_statement_children<R: NodeRewriter>(
        &mut self,
        stmt: Statement,
        rewriter: &mut R,
        context: &TransformationContext,
    ) -> Result<Statement> {
        let inner = context.descend();
        Ok(match stmt {
            Statement::Expr(expr) => Statement::Expr(self.walk_expression(expr, rewriter, context)?),
            Statement::Assign { ty, lhs, rhs } => Statement::Assign {
                ty,
                lhs: self.walk_expression(lhs, rewriter, context)?,
                rhs: self.walk_expression(rhs, rewriter, context)?,
            },
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => Statement::If {
                cond: self.walk_expression(cond, rewriter, context)?,
                then_branch: self.walk_statements(then_branch, rewriter, &inner)?,
                else_branch: self.walk_statements(else_branch, rewriter, &inner)?,
            },
            Statement::For { ty, var, iter, body } => Statement::For {
                ty,
                var,
                iter: self.walk_expression(iter, rewriter, context)?,
                body: self.walk_statements(body, rewriter, &inner)?,
            },
            Statement::While { cond, body } => Statement::While {
                cond: self.walk_expression(cond, rewriter, context)?,
                body: self.walk_statements(body, rewriter, &inner)?,
            },
            Statement::Return(value) => Statement::Return(
                value
                    .map(|expr| self.walk_expression(expr, rewriter, context))
                    .transpose()?,
            ),
        })
    }

    pub fn walk_expression<R: NodeRewriter>(
        &mut self,
        expr: Expression,
        rewriter: &mut R,
        context: &TransformationContext,
    ) -> Result<Expression> {
        let expr = match expr {
            Expression::Field { recv, name } => Expression::Field {
                recv: Box::new(self.walk_expression(*recv, rewriter, context)?),
                name,
            },
            Expression::Call { callee, args } => Expression::Call {
                callee: Box::new(self.walk_expression(*callee, rewriter, context)?),
                args: self.walk_expressions(args, rewriter, context)?,
            },
            Expression::New { ty, args } => Expression::New {
                ty,
                args: self.walk_expressions(args, rewriter, context)?,
            },
            Expression::Binary { op, left, right } => Expression::Binary {
                op,
                left: Box::new(self.walk_expression(*left, rewriter, context)?),
                right: Box::new(self.walk_expression(*right, rewriter, context)?),
            },
            Expression::Cast { ty, expr } => Expression::Cast {
                ty,
                expr: Box::new(self.walk_expression(*expr, rewriter, context)?),
            },
            Expression::Anno(Annotation { name, exps }) => Expression::Anno(Annotation {
                name,
                exps: self.walk_expressions(exps, rewriter, context)?,
            }),
            leaf @ (Expression::Literal(_) | Expression::Id(_)) => leaf,
        };

        let before = expr.clone();
        let rewritten = rewriter.visit_expression(expr, context)?;
        self.record(NodeKind::Expression, rewritten != before, 1);
        Ok(rewritten)
    }

    fn walk_expressions<R: NodeRewriter>(
        &mut self,
        exprs: Vec<Expression>,
        rewriter: &mut R,
        context: &TransformationContext,
    ) -> Result<Vec<Expression>> {
        exprs
            .into_iter()
            .map(|expr| self.walk_expression(expr, rewriter, context))
            .collect()
    }

    fn record(&mut self, kind: NodeKind, changed: bool, produced: usize) {
        let stats = self.stats.entry(kind).or_default();
        stats.applications += 1;
        if changed {
            stats.transformations += 1;
        }
        if produced == 0 {
            stats.removals += 1;
        }
    }

    fn clear_stats(&mut self) {
        self.stats.clear();
    }

    fn summary(&self) -> TransformationSummary {
        TransformationSummary {
            stats: self.stats.clone(),
            ..TransformationSummary::default()
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a decode: traversal statistics plus the Aux names decoded
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransformationSummary {
    pub stats: BTreeMap<NodeKind, RuleStats>,
    pub auxs_decoded: Vec<String>,
}

impl TransformationSummary {
    pub fn transformations(&self) -> u64 {
        self.stats.values().map(|s| s.transformations).sum()
    }

    pub fn removals(&self) -> u64 {
        self.stats.values().map(|s| s.removals).sum()
    }

    pub fn stats_for(&self, kind: NodeKind) -> RuleStats {
        self.stats.get(&kind).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Clazz, Method};
    use crate::registry::ClassId;

    /// Drops `return;` statements and renames identifier `a` to `b`
    struct Scrubber {
        seen_methods: Vec<String>,
    }

    impl NodeRewriter for Scrubber {
        fn name(&self) -> &'static str {
            "Scrubber"
        }

        fn visit_method(
            &mut self,
            body: Vec<Statement>,
            context: &TransformationContext,
        ) -> Result<Vec<Statement>> {
            self.seen_methods.push(context.location());
            Ok(body)
        }

        fn visit_statement(
            &mut self,
            stmt: Statement,
            _context: &TransformationContext,
        ) -> Result<Vec<Statement>> {
            match stmt {
                Statement::Return(None) => Ok(vec![]),
                other => Ok(vec![other]),
            }
        }

        fn visit_expression(
            &mut self,
            expr: Expression,
            _context: &TransformationContext,
        ) -> Result<Expression> {
            match expr {
                Expression::Id(name) if name == "a" => Ok(Expression::id("b")),
                other => Ok(other),
            }
        }
    }

    fn program_with_body(body: Vec<Statement>) -> (Template, Registry) {
        let mut registry = Registry::new();
        let class = registry.add_class(Clazz::new("C"));
        registry.add_method(Method {
            name: "run".to_string(),
            clazz: class,
            params: vec![],
            ret_ty: "void".to_string(),
            is_init: false,
            body,
        });
        let template = Template {
            classes: vec![class],
            obs_auxs: vec![],
        };
        (template, registry)
    }

    #[test]
    fn test_walk_rewrites_nested_nodes() -> anyhow::Result<()> {
        let body = vec![Statement::While {
            cond: Expression::id("a"),
            body: vec![
                Statement::Return(None),
                Statement::Expr(Expression::call(Expression::id("f"), vec![Expression::id("a")])),
            ],
        }];
        let (template, mut registry) = program_with_body(body);

        let mut scrubber = Scrubber { seen_methods: vec![] };
        let summary = Tracer::new().walk(&template, &mut registry, &mut scrubber)?;

        let method = registry.method(registry.class(ClassId(0)).methods[0]);
        assert_eq!(
            method.body,
            vec![Statement::While {
                cond: Expression::id("b"),
                body: vec![Statement::Expr(Expression::call(
                    Expression::id("f"),
                    vec![Expression::id("b")]
                ))],
            }]
        );
        assert_eq!(scrubber.seen_methods, vec!["C.run".to_string()]);
        assert_eq!(summary.removals(), 1);
        assert_eq!(summary.stats_for(NodeKind::Expression).transformations, 2);
        Ok(())
    }

    #[test]
    fn test_walk_rejects_excessive_nesting() {
        let mut body = vec![Statement::Return(Some(Expression::int(1)))];
        for _ in 0..5 {
            body = vec![Statement::While {
                cond: Expression::bool(true),
                body,
            }];
        }
        let (template, mut registry) = program_with_body(body);

        let mut scrubber = Scrubber { seen_methods: vec![] };
        let result = Tracer::new()
            .max_depth(3)
            .walk(&template, &mut registry, &mut scrubber);
        assert!(matches!(result, Err(DecodeError::StructuralContract { .. })));
    }
}
