/*!
# Role Resolution

Turns the solver's role-hole integers into concrete registry entries for one
auxiliary dispatcher.
*/

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::ast::AuxDispatcher;
use crate::config::EventCounts;
use crate::errors::{DecodeError, Result};
use crate::registry::{ClassId, MethodId, Registry};
use crate::trace::RoleBindings;

/// Participants of the Observer pattern that the solver binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Subject,
    Observer,
    Attach,
    Detach,
    Handle,
    Update,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Subject,
        Role::Observer,
        Role::Attach,
        Role::Detach,
        Role::Handle,
        Role::Update,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Subject => "subject",
            Role::Observer => "observer",
            Role::Attach => "attach",
            Role::Detach => "detach",
            Role::Handle => "handle",
            Role::Update => "update",
        }
    }

    /// Canonical hole name for this role of `aux`: `<role>_<aux>`
    pub fn hole(&self, aux: &str) -> String {
        format!("{}_{}", self.as_str(), aux)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete participants chosen for one Aux
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRoles {
    pub subject: ClassId,
    pub observer: ClassId,
    pub event: ClassId,
    pub attach: Option<MethodId>,
    pub detach: Option<MethodId>,
    pub handle: MethodId,
    pub update: MethodId,
}

pub struct RoleResolver<'a> {
    bindings: &'a RoleBindings,
    registry: &'a Registry,
}

impl<'a> RoleResolver<'a> {
    pub fn new(bindings: &'a RoleBindings, registry: &'a Registry) -> Self {
        Self { bindings, registry }
    }

    fn index(&self, aux: &str, role: Role) -> Result<(String, usize)> {
        let hole = role.hole(aux);
        match self.bindings.get(&hole) {
            Some(index) => Ok((hole, index)),
            None => Err(DecodeError::missing_role(aux, &hole)),
        }
    }

    pub fn class_role(&self, aux: &str, role: Role) -> Result<ClassId> {
        let (hole, index) = self.index(aux, role)?;
        self.registry
            .class_at(index)
            .ok_or_else(|| DecodeError::RoleOutOfRange {
                aux: aux.to_string(),
                hole,
                index,
                table: "class",
                len: self.registry.class_count(),
            })
    }

    pub fn method_role(&self, aux: &str, role: Role) -> Result<MethodId> {
        let (hole, index) = self.index(aux, role)?;
        self.registry
            .method_at(index)
            .ok_or_else(|| DecodeError::RoleOutOfRange {
                aux: aux.to_string(),
                hole,
                index,
                table: "method",
                len: self.registry.method_count(),
            })
    }

    fn optional_method_role(&self, aux: &str, role: Role, count: u32) -> Result<Option<MethodId>> {
        if count == 0 {
            return Ok(None);
        }
        let method = self.method_role(aux, role)?;
        debug!("{}: {}.{}", role, self.class_name_of(method), self.registry.method(method).name);
        Ok(Some(method))
    }

    fn class_name_of(&self, method: MethodId) -> &str {
        &self.registry.class(self.registry.method(method).clazz).name
    }

    pub fn resolve(
        &self,
        aux: &str,
        dispatcher: &AuxDispatcher,
        counts: EventCounts,
    ) -> Result<ResolvedRoles> {
        let event = dispatcher.event;
        let event_name = &self.registry.class(event).name;

        let mut subject = self.class_role(aux, Role::Subject)?;
        let observer = self.class_role(aux, Role::Observer)?;
        debug!("{}: subject: {}", event_name, self.registry.class(subject).name);
        debug!("{}: observer: {}", event_name, self.registry.class(observer).name);

        let attach = self.optional_method_role(aux, Role::Attach, counts.attach)?;
        let detach = self.optional_method_role(aux, Role::Detach, counts.detach)?;

        let handle = self.method_role(aux, Role::Handle)?;
        let update = self.method_role(aux, Role::Update)?;
        debug!("handle: {}.{}", self.class_name_of(handle), self.registry.method(handle).name);
        debug!("update: {}.{}", self.class_name_of(update), self.registry.method(update).name);

        // an interface Subject is replaced by the class implementing attach/detach
        if self.registry.class(subject).is_interface {
            let owner = |m: MethodId| self.registry.method(m).clazz;
            let concrete = match (attach.map(owner), detach.map(owner)) {
                (Some(a), Some(d)) if a != d => {
                    let attach_class = self.registry.class(a).name.clone();
                    let detach_class = self.registry.class(d).name.clone();
                    error!("attach and detach should belong to the same class");
                    error!("{} != {}", attach_class, detach_class);
                    return Err(DecodeError::RoleConsistency {
                        aux: aux.to_string(),
                        attach_class,
                        detach_class,
                    });
                }
                (Some(c), _) | (None, Some(c)) => c,
                (None, None) => {
                    return Err(DecodeError::AbstractSubject {
                        aux: aux.to_string(),
                        subject: self.registry.class(subject).name.clone(),
                    });
                }
            };
            debug!(
                "{}: subject: {} => {}",
                event_name,
                self.registry.class(subject).name,
                self.registry.class(concrete).name
            );
            subject = concrete;
        }

        Ok(ResolvedRoles {
            subject,
            observer,
            event,
            attach,
            detach,
            handle,
            update,
        })
    }
}
