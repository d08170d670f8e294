/*!
# Structural Rewrites

Whole-member transplants performed once per Aux after its roles are known:
the observer collection on Subject, the attach/detach bodies, and the
concrete handle body built from the Aux's generic one.
*/

use regex::Regex;
use tracing::debug;

use crate::ast::{find_formals, Annotation, Expression, Field, Statement};
use crate::config::DecodeConfig;
use crate::errors::{DecodeError, Result};
use crate::registry::{ClassId, MethodId, Registry};

use super::ResolvedRoles;

const THIS: &str = "this";
const OBJECT: &str = "Object";
const GENERIC_EVENT: &str = "evt";

/// Add `List<Observer> _obs_Observer` to Subject and initialize it
///
/// Returns the collection field name.
pub fn add_collection(
    registry: &mut Registry,
    config: &DecodeConfig,
    subject: ClassId,
    observer: ClassId,
) -> String {
    let observer_name = registry.class(observer).name.clone();
    let ty = config.collection_type_of(&observer_name);
    let name = config.collection_name(&observer_name);
    let init = Expression::New {
        ty: ty.clone(),
        args: vec![],
    };
    debug!("adding field {}.{} of type {}", registry.class(subject).name, name, ty);

    let initializers = registry.initializers(subject);
    let mut field = Field::new(ty, name.clone());
    if initializers.is_empty() {
        field.init = Some(init);
    } else {
        let stmt = Statement::assign(Expression::field(Expression::id(THIS), name.clone()), init);
        for ctor in initializers {
            let body = &mut registry.method_mut(ctor).body;
            let at = usize::from(body.first().is_some_and(is_constructor_chain));
            body.insert(at, stmt.clone());
        }
    }

    let clazz = registry.class_mut(subject);
    clazz.fields.push(field);
    clazz.collection_field = Some(name.clone());
    name
}

// `super(...)` / `this(...)` must stay first in a constructor
fn is_constructor_chain(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::Expr(Expression::Call { callee, .. })
            if matches!(callee.as_ref(), Expression::Id(name) if name == "super" || name == THIS)
    )
}

/// Replace an attach method's body with `<collection>.add(o);`
pub fn define_attach(
    registry: &mut Registry,
    method: MethodId,
    collection: &str,
    observer: ClassId,
) -> Result<()> {
    define_collection_op(registry, method, collection, observer, "add")
}

/// Replace a detach method's body with `<collection>.remove(o);`
pub fn define_detach(
    registry: &mut Registry,
    method: MethodId,
    collection: &str,
    observer: ClassId,
) -> Result<()> {
    define_collection_op(registry, method, collection, observer, "remove")
}

fn define_collection_op(
    registry: &mut Registry,
    method: MethodId,
    collection: &str,
    observer: ClassId,
    op: &str,
) -> Result<()> {
    let observer_name = registry.class(observer).name.clone();
    let target = registry.method(method);
    let formal = find_formals(&target.params, &[observer_name.as_str()])
        .first()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            DecodeError::structural(
                registry.method_identity(method),
                format!("no formal parameter of type {observer_name}"),
            )
        })?;

    debug!(
        "adding {} code into {}.{}",
        op,
        registry.class(target.clazz).name,
        target.name
    );
    let call = Expression::method_call(
        Expression::id(collection),
        op,
        vec![Expression::id(formal)],
    );
    registry.method_mut(method).body = vec![Statement::Expr(call)];
    Ok(())
}

/// How the rebuilt `o.update(this, evt)` call is trimmed to Update's arity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArityAdjust {
    Keep,
    DropEvent,
    DropReceiver,
}

impl ArityAdjust {
    pub fn for_update(registry: &Registry, update: MethodId, subject: ClassId) -> Result<Self> {
        let params = &registry.method(update).params;
        match params.as_slice() {
            [] => Err(DecodeError::structural(
                registry.method_identity(update),
                "update method takes no parameters",
            )),
            [only] if only.ty == registry.class(subject).name => Ok(ArityAdjust::DropEvent),
            [_] => Ok(ArityAdjust::DropReceiver),
            _ => Ok(ArityAdjust::Keep),
        }
    }
}

/// Copy the Aux's generic handle body into the resolved Handle method
pub fn revise_handle(
    registry: &mut Registry,
    config: &DecodeConfig,
    aux: &str,
    roles: &ResolvedRoles,
    generic_handle: MethodId,
) -> Result<()> {
    let handle = registry.method(roles.handle);
    let event_name = registry.class(roles.event).name.clone();
    let event_param = find_formals(&handle.params, &[event_name.as_str()])
        .first()
        .map(|s| s.to_string())
        .ok_or_else(|| {
            DecodeError::structural(
                registry.method_identity(roles.handle),
                format!("no formal parameter of type {event_name}"),
            )
        })?;

    let observer = registry.class(roles.observer).name.clone();
    let rewriter = HandleBodyRewriter {
        aux,
        receiver: format!("rcv_{aux}"),
        generic_collection: &config.collection_prefix,
        collection: config.collection_name(&observer),
        update_dispatch: format!("update_{aux}"),
        update_name: registry.method(roles.update).name.clone(),
        event_param,
        arity: ArityAdjust::for_update(registry, roles.update, roles.subject)?,
        aux_type: word(aux)?,
        object_type: word(OBJECT)?,
        observer,
        location: registry.method_identity(roles.handle),
    };

    let generic = registry.method(generic_handle).body.clone();
    let body = rewriter.rewrite_statements(generic)?;
    debug!("revising handle code at {}", registry.method(roles.handle).name);
    registry.method_mut(roles.handle).body = body;
    Ok(())
}

fn word(name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(r"\b{}\b", regex::escape(name)))?)
}

/// Structural substitutions applied to the copied generic handle body
struct HandleBodyRewriter<'a> {
    aux: &'a str,
    receiver: String,
    generic_collection: &'a str,
    collection: String,
    update_dispatch: String,
    update_name: String,
    event_param: String,
    arity: ArityAdjust,
    aux_type: Regex,
    object_type: Regex,
    observer: String,
    location: String,
}

impl HandleBodyRewriter<'_> {
    fn rewrite_statements(&self, stmts: Vec<Statement>) -> Result<Vec<Statement>> {
        stmts.into_iter().map(|s| self.rewrite_statement(s)).collect()
    }

    fn rewrite_statement(&self, stmt: Statement) -> Result<Statement> {
        Ok(match stmt {
            Statement::Expr(expr) => Statement::Expr(self.rewrite_expr(expr)?),
            Statement::Assign { ty, lhs, rhs } => Statement::Assign {
                ty: ty.map(|t| self.retype(&t)),
                lhs: self.rewrite_expr(lhs)?,
                rhs: self.rewrite_expr(rhs)?,
            },
            Statement::If {
                cond,
                then_branch,
                else_branch,
            } => Statement::If {
                cond: self.rewrite_expr(cond)?,
                then_branch: self.rewrite_statements(then_branch)?,
                else_branch: self.rewrite_statements(else_branch)?,
            },
            Statement::For { ty, var, iter, body } => Statement::For {
                ty: self.retype(&ty),
                var,
                iter: self.rewrite_expr(iter)?,
                body: self.rewrite_statements(body)?,
            },
            Statement::While { cond, body } => Statement::While {
                cond: self.rewrite_expr(cond)?,
                body: self.rewrite_statements(body)?,
            },
            Statement::Return(value) => {
                Statement::Return(value.map(|e| self.rewrite_expr(e)).transpose()?)
            }
        })
    }

    fn rewrite_exprs(&self, exprs: Vec<Expression>) -> Result<Vec<Expression>> {
        exprs.into_iter().map(|e| self.rewrite_expr(e)).collect()
    }

    fn rewrite_expr(&self, expr: Expression) -> Result<Expression> {
        Ok(match expr {
            // <Aux>.reflect(update_<Aux>, o, args...) -> o.<update>(args...)
            Expression::Call { callee, args } if self.is_update_dispatch(&callee, &args) => {
                let mut args = args.into_iter().skip(1);
                let recv = args.next().map(|r| self.rewrite_expr(r)).transpose()?;
                let recv = recv.ok_or_else(|| {
                    DecodeError::structural(&self.location, "update dispatch without a receiver")
                })?;
                let rest = self.adjust_arity(self.rewrite_exprs(args.collect())?)?;
                Expression::method_call(recv, self.update_name.clone(), rest)
            }
            Expression::Call { callee, args } => Expression::Call {
                callee: Box::new(self.rewrite_expr(*callee)?),
                args: self.rewrite_exprs(args)?,
            },
            Expression::Id(name) => Expression::Id(self.rename(name)),
            Expression::Field { recv, name } => Expression::Field {
                recv: Box::new(self.rewrite_expr(*recv)?),
                name: self.rename_member(name),
            },
            Expression::New { ty, args } => Expression::New {
                ty: self.retype(&ty),
                args: self.rewrite_exprs(args)?,
            },
            Expression::Binary { op, left, right } => Expression::Binary {
                op,
                left: Box::new(self.rewrite_expr(*left)?),
                right: Box::new(self.rewrite_expr(*right)?),
            },
            Expression::Cast { ty, expr } => Expression::Cast {
                ty: self.retype(&ty),
                expr: Box::new(self.rewrite_expr(*expr)?),
            },
            Expression::Anno(Annotation { name, exps }) => Expression::Anno(Annotation {
                name,
                exps: self.rewrite_exprs(exps)?,
            }),
            lit @ Expression::Literal(_) => lit,
        })
    }

    fn is_update_dispatch(&self, callee: &Expression, args: &[Expression]) -> bool {
        let reflect = matches!(
            callee,
            Expression::Field { recv, name }
                if name == "reflect" && matches!(recv.as_ref(), Expression::Id(id) if id == self.aux)
        );
        reflect
            && args.len() >= 2
            && args[0].trailing_name() == Some(self.update_dispatch.as_str())
    }

    fn adjust_arity(&self, mut args: Vec<Expression>) -> Result<Vec<Expression>> {
        let position = match self.arity {
            ArityAdjust::Keep => return Ok(args),
            ArityAdjust::DropEvent => args.iter().position(|a| self.is_event_arg(a)),
            ArityAdjust::DropReceiver => args
                .iter()
                .position(|a| matches!(a, Expression::Id(id) if id == THIS)),
        };
        match position {
            Some(i) => {
                args.remove(i);
                Ok(args)
            }
            None => Err(DecodeError::structural(
                &self.location,
                format!("update call has no argument to drop for {:?}", self.arity),
            )),
        }
    }

    // `e` or `(Event) e`
    fn is_event_arg(&self, arg: &Expression) -> bool {
        match arg {
            Expression::Id(id) => *id == self.event_param,
            Expression::Cast { expr, .. } => self.is_event_arg(expr),
            _ => false,
        }
    }

    fn rename(&self, name: String) -> String {
        if name.starts_with(&self.receiver) {
            THIS.to_string()
        } else if name == self.generic_collection {
            self.collection.clone()
        } else if name == GENERIC_EVENT {
            self.event_param.clone()
        } else if name == self.aux {
            self.observer.clone()
        } else {
            name
        }
    }

    fn rename_member(&self, name: String) -> String {
        if name == self.generic_collection {
            self.collection.clone()
        } else {
            name
        }
    }

    fn retype(&self, ty: &str) -> String {
        let ty = self.aux_type.replace_all(ty, self.observer.as_str());
        self.object_type
            .replace_all(&ty, self.observer.as_str())
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Clazz, Method, Param};
    use pretty_assertions::assert_eq;

    const AUX: &str = "AuxObserverActionEvent";

    fn method(name: &str, clazz: ClassId, params: Vec<Param>, is_init: bool) -> Method {
        Method {
            name: name.to_string(),
            clazz,
            params,
            ret_ty: "void".to_string(),
            is_init,
            body: vec![],
        }
    }

    struct Fixture {
        registry: Registry,
        roles: ResolvedRoles,
        generic: MethodId,
    }

    fn generic_handle_body() -> Vec<Statement> {
        // for (Object o : rcv_Aux._obs) { Aux.reflect(update_Aux, o, rcv_Aux, (ActionEvent) evt); }
        vec![Statement::For {
            ty: OBJECT.to_string(),
            var: "o".to_string(),
            iter: Expression::field(Expression::id(format!("rcv_{AUX}")), "_obs"),
            body: vec![Statement::Expr(Expression::method_call(
                Expression::id(AUX),
                "reflect",
                vec![
                    Expression::id(format!("update_{AUX}")),
                    Expression::id("o"),
                    Expression::id(format!("rcv_{AUX}")),
                    Expression::cast("ActionEvent", Expression::id(GENERIC_EVENT)),
                ],
            ))],
        }]
    }

    fn fixture(update_params: Vec<Param>) -> Fixture {
        let mut registry = Registry::new();
        let aux = registry.add_class(Clazz::new(AUX));
        let event = registry.add_class(Clazz::new("ActionEvent"));
        let subject = registry.add_class(Clazz::new("Button"));
        let observer = registry.add_class(Clazz::new("Listener"));

        let generic = registry.add_method(method(
            &format!("handleCode_{AUX}"),
            aux,
            vec![Param::new(AUX, "rcv"), Param::new("ActionEvent", "evt")],
            false,
        ));
        registry.method_mut(generic).body = generic_handle_body();

        registry.add_method(method("Button", subject, vec![], true));
        let attach = registry.add_method(method(
            "addListener",
            subject,
            vec![Param::new("Listener", "l")],
            false,
        ));
        let detach = registry.add_method(method(
            "removeListener",
            subject,
            vec![Param::new("Listener", "l")],
            false,
        ));
        let handle = registry.add_method(method(
            "fire",
            subject,
            vec![Param::new("ActionEvent", "e")],
            false,
        ));
        let update = registry.add_method(method("onAction", observer, update_params, false));

        Fixture {
            registry,
            roles: ResolvedRoles {
                subject,
                observer,
                event,
                attach: Some(attach),
                detach: Some(detach),
                handle,
                update,
            },
            generic,
        }
    }

    fn two_params() -> Vec<Param> {
        vec![Param::new("Button", "src"), Param::new("ActionEvent", "e")]
    }

    fn update_call(fx: &Fixture) -> Expression {
        match &fx.registry.method(fx.roles.handle).body[0] {
            Statement::For { body, .. } => match &body[0] {
                Statement::Expr(call) => call.clone(),
                other => panic!("unexpected statement {other:?}"),
            },
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_add_collection_initializes_in_constructor() {
        let mut fx = fixture(two_params());
        let config = DecodeConfig::default();
        let name = add_collection(&mut fx.registry, &config, fx.roles.subject, fx.roles.observer);

        assert_eq!(name, "_obs_Listener");
        let button = fx.registry.class(fx.roles.subject);
        assert_eq!(button.collection_field.as_deref(), Some("_obs_Listener"));
        assert_eq!(button.fields, vec![Field::new("LinkedList<Listener>", "_obs_Listener")]);

        let ctor = fx.registry.initializers(fx.roles.subject)[0];
        assert_eq!(
            fx.registry.method(ctor).body,
            vec![Statement::assign(
                Expression::field(Expression::id("this"), "_obs_Listener"),
                Expression::New {
                    ty: "LinkedList<Listener>".to_string(),
                    args: vec![]
                },
            )]
        );
    }

    #[test]
    fn test_attach_and_detach_bodies() -> anyhow::Result<()> {
        let mut fx = fixture(two_params());
        let attach = fx.roles.attach.expect("attach bound");
        let detach = fx.roles.detach.expect("detach bound");
        fx.registry.method_mut(attach).body = vec![Statement::Return(None)];

        define_attach(&mut fx.registry, attach, "_obs_Listener", fx.roles.observer)?;
        define_detach(&mut fx.registry, detach, "_obs_Listener", fx.roles.observer)?;

        let add = Expression::method_call(Expression::id("_obs_Listener"), "add", vec![Expression::id("l")]);
        let remove =
            Expression::method_call(Expression::id("_obs_Listener"), "remove", vec![Expression::id("l")]);
        assert_eq!(fx.registry.method(attach).body, vec![Statement::Expr(add)]);
        assert_eq!(fx.registry.method(detach).body, vec![Statement::Expr(remove)]);

        // the handle takes no Listener
        let result = define_attach(&mut fx.registry, fx.roles.handle, "_obs_Listener", fx.roles.observer);
        assert!(matches!(result, Err(DecodeError::StructuralContract { .. })));
        Ok(())
    }

    #[test]
    fn test_revise_handle_with_full_arity() -> anyhow::Result<()> {
        let mut fx = fixture(two_params());
        let config = DecodeConfig::default();
        revise_handle(&mut fx.registry, &config, AUX, &fx.roles, fx.generic)?;

        let body = &fx.registry.method(fx.roles.handle).body;
        assert_eq!(
            body,
            &vec![Statement::For {
                ty: "Listener".to_string(),
                var: "o".to_string(),
                iter: Expression::field(Expression::id("this"), "_obs_Listener"),
                body: vec![Statement::Expr(Expression::method_call(
                    Expression::id("o"),
                    "onAction",
                    vec![
                        Expression::id("this"),
                        Expression::cast("ActionEvent", Expression::id("e")),
                    ],
                ))],
            }]
        );
        // generic body is left untouched
        assert_eq!(fx.registry.method(fx.generic).body, generic_handle_body());
        Ok(())
    }

    #[test]
    fn test_single_subject_param_drops_event() -> anyhow::Result<()> {
        let mut fx = fixture(vec![Param::new("Button", "src")]);
        revise_handle(&mut fx.registry, &DecodeConfig::default(), AUX, &fx.roles, fx.generic)?;
        assert_eq!(
            update_call(&fx),
            Expression::method_call(Expression::id("o"), "onAction", vec![Expression::id("this")])
        );
        Ok(())
    }

    #[test]
    fn test_single_other_param_drops_receiver() -> anyhow::Result<()> {
        let mut fx = fixture(vec![Param::new("ActionEvent", "e")]);
        revise_handle(&mut fx.registry, &DecodeConfig::default(), AUX, &fx.roles, fx.generic)?;
        assert_eq!(
            update_call(&fx),
            Expression::method_call(
                Expression::id("o"),
                "onAction",
                vec![Expression::cast("ActionEvent", Expression::id("e"))]
            )
        );
        Ok(())
    }

    #[test]
    fn test_update_without_params_is_rejected() {
        let mut fx = fixture(vec![]);
        let result = revise_handle(&mut fx.registry, &DecodeConfig::default(), AUX, &fx.roles, fx.generic);
        assert!(matches!(result, Err(DecodeError::StructuralContract { .. })));
    }

    #[test]
    fn test_retype_only_replaces_whole_words() -> anyhow::Result<()> {
        let rewriter = HandleBodyRewriter {
            aux: AUX,
            receiver: format!("rcv_{AUX}"),
            generic_collection: "_obs",
            collection: "_obs_Listener".to_string(),
            update_dispatch: format!("update_{AUX}"),
            update_name: "onAction".to_string(),
            event_param: "e".to_string(),
            arity: ArityAdjust::Keep,
            aux_type: word(AUX)?,
            object_type: word(OBJECT)?,
            observer: "Listener".to_string(),
            location: "test".to_string(),
        };
        assert_eq!(rewriter.retype(&format!("List<{AUX}>")), "List<Listener>");
        assert_eq!(rewriter.retype("List<Object>"), "List<Listener>");
        assert_eq!(rewriter.retype("ObjectStream"), "ObjectStream");
        Ok(())
    }
}
