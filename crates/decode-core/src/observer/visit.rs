//! Node rules applied to every remaining class once all Auxs are decoded

use tracing::debug;

use crate::ast::{Annotation, Clazz, Expression, Field, Literal, Statement, ToSource};
use crate::errors::{DecodeError, Result};
use crate::registry::ClassId;
use crate::trace::{operand_key, Direction};
use crate::tracer::{NodeRewriter, TransformationContext};

use super::{ObserverDecoder, Role, RoleResolver};

const COMPARE: &str = "Compare";
const COMPARE_STRING: &str = "CompareString";
const SUBCLASS: &str = "subcls";

impl ObserverDecoder {
    fn marker(&self) -> &str {
        &self.config.aux_marker
    }

    fn subject_of<'r>(&self, aux: &str, context: &TransformationContext<'r>) -> Result<&'r Clazz> {
        self.resolved
            .get(aux)
            .map(|roles| context.registry.class(roles.subject))
            .ok_or_else(|| DecodeError::unknown_aux(aux))
    }

    /// Replace every decoded Aux name inside a type with its Subject
    fn retype(&self, ty: &str, context: &TransformationContext) -> Result<String> {
        for (aux, pattern) in &self.aux_types {
            if pattern.is_match(ty) {
                let subject = self.subject_of(aux, context)?;
                return Ok(pattern.replace_all(ty, subject.name.as_str()).into_owned());
            }
        }
        Err(DecodeError::unknown_aux(ty))
    }

    /// `auxobserveractionevent` style names become the lower-cased Subject
    fn rename(&self, name: String, context: &TransformationContext) -> Result<String> {
        let marker = self.config.aux_marker_lower();
        if !name.contains(&marker) {
            return Ok(name);
        }
        let aux = self
            .aux_types
            .iter()
            .map(|(aux, _)| aux)
            .find(|aux| name.contains(&aux.to_lowercase()))
            .ok_or_else(|| DecodeError::unknown_aux(&name))?;
        let renamed = self.subject_of(aux, context)?.lower();
        debug!("{}: {} -> {}", context.location(), name, renamed);
        Ok(renamed)
    }

    fn is_subject_call(&self, stmt: &Statement) -> bool {
        let Statement::Expr(expr) = stmt else {
            return false;
        };
        matches!(
            expr.as_method_call(),
            Some((Expression::Id(recv), "subjectCall", _)) if recv.starts_with(self.marker())
        )
    }

    /// `<Aux>` when `callee` is `<Aux>.reflect`
    fn reflect_target(&self, callee: &Expression) -> Option<String> {
        match callee {
            Expression::Field { recv, name } if name == "reflect" => match recv.as_ref() {
                Expression::Id(aux) if aux.starts_with(self.marker()) => Some(aux.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// `<Aux>.reflect(<Aux>.handle_<Aux>, rcv, args...)` -> `rcv.<handle>(args...)`
    fn dispatch_to_handle(&self, expr: Expression, context: &TransformationContext) -> Result<Expression> {
        let Expression::Call { callee, args } = expr else {
            return Ok(expr);
        };
        let Some(aux) = self.reflect_target(&callee) else {
            return Ok(Expression::Call { callee, args });
        };
        let hole = Role::Handle.hole(&aux);
        if args.len() < 2 || args[0].trailing_name() != Some(hole.as_str()) {
            return Ok(Expression::Call { callee, args });
        }

        let handle = RoleResolver::new(&self.roles, context.registry).method_role(&aux, Role::Handle)?;
        let mut args = args.into_iter().skip(1);
        let Some(receiver) = args.next() else {
            return Err(DecodeError::structural(context.location(), "reflective call without a receiver"));
        };
        let rest: Vec<Expression> = args.filter(|arg| !arg.is_null()).collect();
        let call = Expression::method_call(receiver, context.registry.method(handle).name.clone(), rest);
        debug!("{}: dispatch resolved to {}", context.location(), call.to_source());
        Ok(call)
    }

    fn is_collection_walk(&self, iter: &Expression, context: &TransformationContext) -> bool {
        let collection = context.registry.class(context.class).collection_field.as_deref();
        collection.is_some() && iter.trailing_name() == collection
    }

    /// `for (T o : coll) body` -> iterator acquisition plus a `while` loop
    fn iterator_loop(
        &self,
        ty: String,
        var: String,
        iter: Expression,
        body: Vec<Statement>,
        context: &TransformationContext,
    ) -> Vec<Statement> {
        let direction = context
            .method
            .map(|m| context.registry.method_identity(m))
            .and_then(|key| self.facts.direction(&key))
            .unwrap_or_default();
        let acquire = match direction {
            Direction::Forward => "iterator",
            Direction::Reverse => "descendingIterator",
        };
        let iterator = format!("iter_{}", iter.trailing_name().unwrap_or_default());
        debug!("resolved: iterator for {}: {:?}", iterator, direction);

        let next = Expression::cast(
            ty.clone(),
            Expression::method_call(Expression::id(&iterator), "next", vec![]),
        );
        let mut loop_body = vec![Statement::declare(ty, var, next)];
        loop_body.extend(body);

        vec![
            Statement::declare(
                "Iterator",
                iterator.clone(),
                Expression::method_call(iter, acquire, vec![]),
            ),
            Statement::While {
                cond: Expression::method_call(Expression::id(iterator), "hasNext", vec![]),
                body: loop_body,
            },
        ]
    }

    fn resolve_annotation(&self, anno: Annotation, context: &TransformationContext) -> Result<Expression> {
        if anno.name != COMPARE && anno.name != COMPARE_STRING {
            return Ok(Expression::Anno(anno));
        }
        let name = anno.name;
        let [left, right] = <[Expression; 2]>::try_from(anno.exps).map_err(|exps| {
            DecodeError::structural(
                context.location(),
                format!("@{} takes two operands, got {}", name, exps.len()),
            )
        })?;

        if name == COMPARE_STRING {
            return Ok(Expression::method_call(left, "equals", vec![right]));
        }

        let method = match context.method {
            Some(m) => context.registry.method_identity(m),
            None => context.location(),
        };
        let (left_src, right_src) = (left.to_source(), right.to_source());
        let op = self
            .facts
            .find_comparison(&method, &operand_key(&left_src), &operand_key(&right_src))
            .ok_or_else(|| DecodeError::MissingFact {
                method: method.clone(),
                left: left_src.clone(),
                right: right_src.clone(),
            })?;
        debug!("resolved: {} {} {}", left_src, op, right_src);
        Ok(Expression::binary(op, left, right))
    }

    /// `subcls(n, ...subject_<Aux>)` -> whether class `n` is a subclass of the bound Subject
    fn evaluate_subclass(
        &self,
        callee: Box<Expression>,
        args: Vec<Expression>,
        context: &TransformationContext,
    ) -> Result<Expression> {
        let is_subcls = matches!(callee.as_ref(), Expression::Id(name) if name == SUBCLASS);
        let target = match (is_subcls, args.as_slice()) {
            (true, [Expression::Literal(Literal::Int(sub)), sup])
                if sup.to_source().contains(Role::Subject.as_str()) =>
            {
                sup.trailing_name().map(|hole| (*sub, hole.to_string()))
            }
            _ => None,
        };
        let Some((sub, hole)) = target else {
            return Ok(Expression::Call { callee, args });
        };

        let aux = hole
            .strip_prefix(&format!("{}_", Role::Subject))
            .unwrap_or(&hole)
            .to_string();
        let sup_index = self
            .roles
            .get(&hole)
            .ok_or_else(|| DecodeError::missing_role(&aux, &hole))?;
        let sub_index = usize::try_from(sub).map_err(|_| {
            DecodeError::structural(context.location(), format!("negative class index {sub}"))
        })?;
        let sub_class = self.class_index(&aux, &hole, sub_index, context)?;
        let sup_class = self.class_index(&aux, &hole, sup_index, context)?;

        let result = self.hierarchy.is_subclass_or_equal(sub_class, sup_class);
        debug!(
            "resolved: {} <= {}: {}",
            context.registry.class(sub_class).name,
            context.registry.class(sup_class).name,
            result
        );
        Ok(Expression::bool(result))
    }

    fn class_index(
        &self,
        aux: &str,
        hole: &str,
        index: usize,
        context: &TransformationContext,
    ) -> Result<ClassId> {
        context
            .registry
            .class_at(index)
            .ok_or_else(|| DecodeError::RoleOutOfRange {
                aux: aux.to_string(),
                hole: hole.to_string(),
                index,
                table: "class",
                len: context.registry.class_count(),
            })
    }
}

impl NodeRewriter for ObserverDecoder {
    fn name(&self) -> &'static str {
        "ObserverDecoder"
    }

    // Aux... aux...; -> Subject subject;
    fn visit_field(&mut self, mut field: Field, context: &TransformationContext) -> Result<Vec<Field>> {
        if field.ty.contains(self.marker()) && field.name == field.ty.to_lowercase() {
            let subject = self.subject_of(&field.ty, context)?;
            debug!("{}: field {} -> {}", context.location(), field.ty, subject.name);
            field.ty = subject.name.clone();
            field.name = subject.lower();
        }
        Ok(vec![field])
    }

    fn visit_method(
        &mut self,
        mut body: Vec<Statement>,
        context: &TransformationContext,
    ) -> Result<Vec<Statement>> {
        let Some(method) = context.method else {
            return Ok(body);
        };
        if body.is_empty() {
            return Ok(body);
        }

        if context.registry.method(method).is_init {
            let tmp = &self.config.tmp_marker;
            body.retain(|stmt| {
                let keep = !stmt.to_source().contains(tmp.as_str());
                if !keep {
                    debug!("at {}, removing {}", context.location(), stmt.to_source());
                }
                keep
            });
        } else if self.is_subject_call(&body[0]) {
            debug!("at {}, removing {}", context.location(), body[0].to_source());
            body.remove(0);
        }
        Ok(body)
    }

    fn visit_statement(
        &mut self,
        stmt: Statement,
        context: &TransformationContext,
    ) -> Result<Vec<Statement>> {
        match stmt {
            Statement::Expr(expr) => Ok(vec![Statement::Expr(self.dispatch_to_handle(expr, context)?)]),

            Statement::Assign { ty: Some(ty), lhs, rhs } if ty.contains(self.marker()) => {
                Ok(vec![Statement::Assign {
                    ty: Some(self.retype(&ty, context)?),
                    lhs,
                    rhs,
                }])
            }

            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => match cond.to_source().as_str() {
                "false" => {
                    debug!("removing true branch in {}", context.location());
                    Ok(else_branch)
                }
                "true" => {
                    debug!("removing false branch in {}", context.location());
                    Ok(then_branch)
                }
                _ => Ok(vec![Statement::If {
                    cond,
                    then_branch,
                    else_branch,
                }]),
            },

            Statement::For { ty, var, iter, body } if self.is_collection_walk(&iter, context) => {
                Ok(self.iterator_loop(ty, var, iter, body, context))
            }

            other => Ok(vec![other]),
        }
    }

    fn visit_expression(
        &mut self,
        expr: Expression,
        context: &TransformationContext,
    ) -> Result<Expression> {
        match expr {
            Expression::Anno(anno) => self.resolve_annotation(anno, context),
            Expression::Id(name) => Ok(Expression::Id(self.rename(name, context)?)),
            Expression::Field { recv, name } => Ok(Expression::Field {
                recv,
                name: self.rename(name, context)?,
            }),
            Expression::Call { callee, args } => self.evaluate_subclass(callee, args, context),
            // (Aux...) x -> (Subject) x
            Expression::Cast { ty, expr } if ty.contains(self.marker()) => Ok(Expression::Cast {
                ty: self.retype(&ty, context)?,
                expr,
            }),
            other => Ok(other),
        }
    }
}
