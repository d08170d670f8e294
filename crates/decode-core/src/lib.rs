//! # Decode Core
//!
//! Decodes solver traces back into concrete code for Observer-pattern
//! skeletons, including:
//! - Skeleton AST and its Java-like rendering
//! - Index-addressed class and method registries
//! - Trace parsing into role bindings and expression facts
//! - Role resolution and the structural rewrites per auxiliary dispatcher
//! - A bottom-up rewriting engine and the Observer node rules
//!
//! The command-line front end lives in `decode-cli`; this crate can be
//! embedded by any driver that can produce a [`Program`] and a trace.

#![warn(clippy::all)]

pub mod ast;
pub mod config;
pub mod errors;
pub mod observer;
pub mod registry;
pub mod trace;
pub mod tracer;

// Re-export commonly used types
pub use ast::{render_template, Clazz, Expression, Field, Method, Param, Statement, Template, ToSource};
pub use config::{DecodeConfig, EventConfig, EventCounts};
pub use errors::{DecodeError, Result};
pub use observer::{ObserverDecoder, ResolvedRoles, Role};
pub use registry::{ClassId, MethodId, Program, Registry};
pub use trace::{FactTable, RoleBindings, TraceFacts, TraceParser};
pub use tracer::{NodeRewriter, Tracer, TransformationSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the decoder; `RUST_LOG` overrides the default level
pub fn init_tracing(debug: bool) {
    let default = if debug { "decode_core=debug" } else { "decode_core=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    // a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
