/*!
# Class and Method Registries

Ordered, index-addressable tables of every class and method in the program
under transformation. The solver encodes role choices as integers that index
straight into these tables, so the order is fixed before decoding starts and
the decoder never appends, removes or reorders entries.
*/

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{Clazz, Method, Template};
use crate::errors::{DecodeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub usize);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    classes: Vec<Clazz>,
    methods: Vec<Method>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; used by skeleton builders before decoding
    pub fn add_class(&mut self, clazz: Clazz) -> ClassId {
        self.classes.push(clazz);
        ClassId(self.classes.len() - 1)
    }

    /// Register a method and list it on its declaring class
    pub fn add_method(&mut self, method: Method) -> MethodId {
        let owner = method.clazz;
        self.methods.push(method);
        let id = MethodId(self.methods.len() - 1);
        if let Some(clazz) = self.classes.get_mut(owner.0) {
            clazz.methods.push(id);
        }
        id
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Class at a solver-chosen index, if in range
    pub fn class_at(&self, index: usize) -> Option<ClassId> {
        (index < self.classes.len()).then_some(ClassId(index))
    }

    /// Method at a solver-chosen index, if in range
    pub fn method_at(&self, index: usize) -> Option<MethodId> {
        (index < self.methods.len()).then_some(MethodId(index))
    }

    pub fn class(&self, id: ClassId) -> &Clazz {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut Clazz {
        &mut self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.0]
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.classes
            .iter()
            .position(|c| c.name == name)
            .map(ClassId)
    }

    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Clazz)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i), c))
    }

    /// Identity used to key expression facts: `name_Class_ParamTy..._ParamTy`
    pub fn method_identity(&self, id: MethodId) -> String {
        let method = self.method(id);
        let mut parts = vec![method.name.as_str(), self.class(method.clazz).name.as_str()];
        parts.extend(method.param_types());
        parts.join("_")
    }

    /// Initializer methods (constructors) declared by a class
    pub fn initializers(&self, clazz: ClassId) -> Vec<MethodId> {
        self.class(clazz)
            .methods
            .iter()
            .copied()
            .filter(|m| self.method(*m).is_init)
            .collect()
    }

    pub fn hierarchy(&self) -> Hierarchy {
        Hierarchy::build(self)
    }
}

/// Reflexive-transitive supertype sets for every registered class
///
/// Supertypes are referenced by name; names missing from the registry are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    ancestors: HashMap<ClassId, HashSet<ClassId>>,
}

impl Hierarchy {
    pub fn build(registry: &Registry) -> Self {
        let by_name: HashMap<&str, ClassId> = registry
            .classes()
            .map(|(id, c)| (c.name.as_str(), id))
            .collect();

        let mut ancestors = HashMap::new();
        for (id, _) in registry.classes() {
            let mut seen = HashSet::new();
            let mut pending = vec![id];
            while let Some(current) = pending.pop() {
                if !seen.insert(current) {
                    continue;
                }
                let clazz = registry.class(current);
                let supers = clazz.sup.iter().chain(clazz.interfaces.iter());
                pending.extend(supers.filter_map(|name| by_name.get(name.as_str()).copied()));
            }
            ancestors.insert(id, seen);
        }

        Self { ancestors }
    }

    /// `sub <= sup`: the same class, or `sup` is one of its supertypes
    pub fn is_subclass_or_equal(&self, sub: ClassId, sup: ClassId) -> bool {
        sub == sup
            || self
                .ancestors
                .get(&sub)
                .is_some_and(|set| set.contains(&sup))
    }
}

/// Skeleton template plus the registries its class ids point into
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub template: Template,
    pub registry: Registry,
}

impl Program {
    /// Check that every stored class and method id points into the registry
    ///
    /// Programs built through [`Registry::add_class`]/[`Registry::add_method`]
    /// always pass; deserialized ones may not.
    pub fn validate(&self) -> Result<()> {
        let registry = &self.registry;
        let class_ok = |id: ClassId| id.0 < registry.class_count();
        let method_ok = |id: MethodId| id.0 < registry.method_count();

        if let Some(id) = self.template.classes.iter().copied().find(|c| !class_ok(*c)) {
            return Err(DecodeError::structural("template", format!("dangling {id}")));
        }
        for clazz in &registry.classes {
            if let Some(id) = clazz.methods.iter().copied().find(|m| !method_ok(*m)) {
                return Err(DecodeError::structural(&clazz.name, format!("dangling {id}")));
            }
            if let Some(aux) = clazz.aux {
                if !class_ok(aux.event) {
                    let detail = format!("dangling event {}", aux.event);
                    return Err(DecodeError::structural(&clazz.name, detail));
                }
                if !method_ok(aux.handle) {
                    let detail = format!("dangling handle {}", aux.handle);
                    return Err(DecodeError::structural(&clazz.name, detail));
                }
            }
        }
        if let Some(method) = registry.methods.iter().find(|m| !class_ok(m.clazz)) {
            return Err(DecodeError::structural(
                &method.name,
                format!("declared by dangling {}", method.clazz),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AuxDispatcher, Param};

    fn method(name: &str, clazz: ClassId, params: Vec<Param>) -> Method {
        Method {
            name: name.to_string(),
            clazz,
            params,
            ret_ty: "void".to_string(),
            is_init: false,
            body: Vec::new(),
        }
    }

    #[test]
    fn test_index_lookup_is_range_checked() {
        let mut registry = Registry::new();
        let a = registry.add_class(Clazz::new("A"));
        registry.add_method(method("run", a, vec![]));

        assert_eq!(registry.class_at(0), Some(a));
        assert_eq!(registry.class_at(1), None);
        assert_eq!(registry.method_at(0), Some(MethodId(0)));
        assert_eq!(registry.method_at(7), None);
        assert_eq!(registry.class(a).methods, vec![MethodId(0)]);
    }

    #[test]
    fn test_method_identity_joins_class_and_param_types() {
        let mut registry = Registry::new();
        let aux = registry.add_class(Clazz::new("AuxObserverActionEvent"));
        let id = registry.add_method(method(
            "handleCode_AuxObserverActionEvent",
            aux,
            vec![
                Param::new("AuxObserverActionEvent", "rcv"),
                Param::new("ActionEvent", "evt"),
            ],
        ));

        assert_eq!(
            registry.method_identity(id),
            "handleCode_AuxObserverActionEvent_AuxObserverActionEvent_AuxObserverActionEvent_ActionEvent"
        );

        let bare = registry.add_method(method("tick", aux, vec![]));
        assert_eq!(registry.method_identity(bare), "tick_AuxObserverActionEvent");
    }

    #[test]
    fn test_hierarchy_follows_superclasses_and_interfaces() {
        let mut registry = Registry::new();
        let listener = registry.add_class(Clazz {
            is_interface: true,
            ..Clazz::new("Listener")
        });
        let base = registry.add_class(Clazz {
            interfaces: vec!["Listener".to_string()],
            ..Clazz::new("Base")
        });
        let derived = registry.add_class(Clazz {
            sup: Some("Base".to_string()),
            ..Clazz::new("Derived")
        });
        let other = registry.add_class(Clazz::new("Other"));

        let hierarchy = registry.hierarchy();
        assert!(hierarchy.is_subclass_or_equal(derived, derived));
        assert!(hierarchy.is_subclass_or_equal(derived, base));
        assert!(hierarchy.is_subclass_or_equal(derived, listener));
        assert!(!hierarchy.is_subclass_or_equal(base, derived));
        assert!(!hierarchy.is_subclass_or_equal(other, listener));
    }

    #[test]
    fn test_validate_rejects_dangling_ids() {
        let mut registry = Registry::new();
        let a = registry.add_class(Clazz::new("A"));
        registry.add_method(method("run", a, vec![]));
        let mut program = Program {
            template: Template {
                classes: vec![a],
                obs_auxs: vec![],
            },
            registry,
        };
        assert!(program.validate().is_ok());

        program.template.classes.push(ClassId(9));
        assert!(matches!(program.validate(), Err(DecodeError::StructuralContract { .. })));
        program.template.classes.pop();

        program.registry.class_mut(a).aux = Some(AuxDispatcher {
            event: ClassId(4),
            handle: MethodId(0),
        });
        match program.validate() {
            Err(DecodeError::StructuralContract { location, detail }) => {
                assert_eq!(location, "A");
                assert_eq!(detail, "dangling event class#4");
            }
            other => panic!("expected StructuralContract, got {other:?}"),
        }
        program.registry.class_mut(a).aux = None;

        program.registry.method_mut(MethodId(0)).clazz = ClassId(3);
        assert!(matches!(program.validate(), Err(DecodeError::StructuralContract { .. })));
    }
}
