/*!
# Tracer - Skeleton Rewriting Engine

A bottom-up walker over the skeleton tree that hands every node to a
[`NodeRewriter`] and splices back whatever the rewriter returns.

## Architecture

- `NodeRewriter`: per-node-kind rewrite hooks; each hook returns the
  replacement (zero, one or many nodes for fields and statements)
- `Tracer`: walks classes, fields, methods, statements and expressions,
  children before parents
- `TransformationContext`: where in the tree the walker currently is
- `RuleStats` / `TransformationSummary`: what was visited and what changed

## Example Usage

```rust,ignore
use decode_core::tracer::Tracer;

let mut tracer = Tracer::new();
let summary = tracer.walk(&program.template, &mut program.registry, &mut decoder)?;
println!("{} nodes rewritten", summary.transformations());
```
*/

pub mod rules;
pub mod walker;

pub use rules::{NodeKind, NodeRewriter, RuleStats};
pub use walker::{Tracer, TransformationSummary};

use crate::registry::{ClassId, MethodId, Registry};

/// Position of the walker in the tree
#[derive(Debug, Clone, Copy)]
pub struct TransformationContext<'a> {
    pub registry: &'a Registry,
    pub class: ClassId,
    pub method: Option<MethodId>,
    pub current_depth: usize,
    pub max_depth: usize,
}

impl<'a> TransformationContext<'a> {
    pub fn new(registry: &'a Registry, class: ClassId) -> Self {
        Self {
            registry,
            class,
            method: None,
            current_depth: 0,
            max_depth: 256,
        }
    }

    pub fn with_method(mut self, method: MethodId) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn descend(&self) -> Self {
        Self {
            current_depth: self.current_depth + 1,
            ..*self
        }
    }

    pub fn at_max_depth(&self) -> bool {
        self.current_depth >= self.max_depth
    }

    /// Human-readable location for diagnostics: `Class.method` or `Class`
    pub fn location(&self) -> String {
        let class = &self.registry.class(self.class).name;
        match self.method {
            Some(m) => format!("{}.{}", class, self.registry.method(m).name),
            None => class.clone(),
        }
    }
}
