/*!
# Observer Decoder

Turns a solved Observer-pattern skeleton into concrete code.

Decoding runs in two phases:

1. For every Aux listed in the template, resolve its roles from the trace,
   move the generic collection/attach/detach/handle code onto the chosen
   participants, re-key the handle's facts and drop the Aux from the output.
2. Walk the remaining classes once with the node rules in `visit`, which
   retype Aux references and replace the placeholder constructs
   (`@Compare`, `subcls`, reflective dispatch, for-each over observers).

## Example Usage

```rust,ignore
use decode_core::{DecodeConfig, EventConfig, ObserverDecoder};

let mut decoder = ObserverDecoder::from_path("out.trace", DecodeConfig::default(), EventConfig::new())?;
let summary = decoder.decode(&mut program)?;
```
*/

pub mod rewrite;
pub mod roles;
mod visit;

pub use roles::{ResolvedRoles, Role, RoleResolver};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{DecodeConfig, EventConfig};
use crate::errors::{DecodeError, Result};
use crate::registry::{ClassId, Hierarchy, Program};
use crate::trace::{FactTable, RoleBindings, TraceFacts, TraceParser};
use crate::tracer::{Tracer, TransformationSummary};

pub struct ObserverDecoder {
    config: DecodeConfig,
    events: EventConfig,
    facts: FactTable,
    roles: RoleBindings,
    resolved: IndexMap<String, ResolvedRoles>,
    hierarchy: Hierarchy,
    // whole-word matchers for each decoded Aux name, longest name first
    aux_types: Vec<(String, Regex)>,
}

impl ObserverDecoder {
    pub fn new(trace: &str, config: DecodeConfig, events: EventConfig) -> Result<Self> {
        let facts = TraceParser::new(&config)?.parse_str(trace)?;
        Ok(Self::with_facts(facts, config, events))
    }

    pub fn from_reader<R: BufRead>(reader: R, config: DecodeConfig, events: EventConfig) -> Result<Self> {
        let facts = TraceParser::new(&config)?.parse_reader(reader)?;
        Ok(Self::with_facts(facts, config, events))
    }

    pub fn from_path(path: impl AsRef<Path>, config: DecodeConfig, events: EventConfig) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("reading trace {}", path.as_ref().display());
        Self::from_reader(BufReader::new(file), config, events)
    }

    fn with_facts(facts: TraceFacts, config: DecodeConfig, events: EventConfig) -> Self {
        debug!(
            "trace: {} fact keys, {} role holes",
            facts.exprs.keys().count(),
            facts.roles.len()
        );
        Self {
            config,
            events,
            facts: facts.exprs,
            roles: facts.roles,
            resolved: IndexMap::new(),
            hierarchy: Hierarchy::default(),
            aux_types: Vec::new(),
        }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn facts(&self) -> &FactTable {
        &self.facts
    }

    pub fn roles(&self) -> &RoleBindings {
        &self.roles
    }

    /// Roles chosen for an Aux; present once that Aux has been decoded
    pub fn resolved(&self, aux: &str) -> Option<&ResolvedRoles> {
        self.resolved.get(aux)
    }

    /// Concrete Subject class per decoded Aux
    pub fn subjects(&self) -> impl Iterator<Item = (&str, ClassId)> {
        self.resolved
            .iter()
            .map(|(aux, roles)| (aux.as_str(), roles.subject))
    }

    /// Decode every Aux of the template, then rewrite the remaining classes
    pub fn decode(&mut self, program: &mut Program) -> Result<TransformationSummary> {
        program.validate()?;
        let auxs = program.template.obs_auxs.clone();
        for aux in &auxs {
            self.decode_aux(aux, program)?;
        }

        self.hierarchy = program.registry.hierarchy();
        self.aux_types = self.aux_type_patterns()?;

        let mut tracer = Tracer::new().max_depth(self.config.max_depth);
        let mut summary = tracer.walk(&program.template, &mut program.registry, self)?;
        summary.auxs_decoded = auxs;
        info!(
            "decoded {} auxiliary dispatchers, {} nodes rewritten",
            summary.auxs_decoded.len(),
            summary.transformations()
        );
        Ok(summary)
    }

    fn decode_aux(&mut self, aux_name: &str, program: &mut Program) -> Result<()> {
        let registry = &mut program.registry;
        let aux = registry
            .class_by_name(aux_name)
            .ok_or_else(|| DecodeError::unknown_aux(aux_name))?;
        let dispatcher = registry
            .class(aux)
            .aux
            .ok_or_else(|| DecodeError::structural(aux_name, "class has no event or handle"))?;
        let event_name = registry.class(dispatcher.event).name.clone();
        let counts = self.events.counts(&event_name);

        let roles = RoleResolver::new(&self.roles, registry).resolve(aux_name, &dispatcher, counts)?;

        let collection = rewrite::add_collection(registry, &self.config, roles.subject, roles.observer);
        if let Some(attach) = roles.attach {
            rewrite::define_attach(registry, attach, &collection, roles.observer)?;
        }
        if let Some(detach) = roles.detach {
            rewrite::define_detach(registry, detach, &collection, roles.observer)?;
        }
        rewrite::revise_handle(registry, &self.config, aux_name, &roles, dispatcher.handle)?;

        let old = format!("handleCode_{0}_{0}_{0}_{1}", aux_name, event_name);
        let concrete = registry.method_identity(roles.handle);
        if self.facts.rekey(&old, &concrete) {
            debug!("moved facts {} -> {}", old, concrete);
        } else {
            debug!("no facts recorded for {}", old);
        }

        let classes = &mut program.template.classes;
        let position = classes
            .iter()
            .position(|c| *c == aux)
            .ok_or_else(|| DecodeError::structural(aux_name, "not listed in the template"))?;
        classes.remove(position);

        info!(
            "{}: subject {}, observer {}",
            aux_name,
            program.registry.class(roles.subject).name,
            program.registry.class(roles.observer).name
        );
        self.resolved.insert(aux_name.to_string(), roles);
        Ok(())
    }

    fn aux_type_patterns(&self) -> Result<Vec<(String, Regex)>> {
        let mut names: Vec<&String> = self.resolved.keys().collect();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));
        names
            .into_iter()
            .map(|name| {
                let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name)))?;
                Ok((name.clone(), pattern))
            })
            .collect()
    }
}
