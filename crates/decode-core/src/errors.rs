use thiserror::Error;

/// Errors that abort a decode
///
/// Every variant is fatal: once one is raised the skeleton may be half
/// rewritten and must be discarded.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{aux}: no assignment for role hole '{hole}'")]
    MissingRole { aux: String, hole: String },

    #[error("{aux}: role hole '{hole}' = {index} is outside the {table} registry (len {len})")]
    RoleOutOfRange {
        aux: String,
        hole: String,
        index: usize,
        table: &'static str,
        len: usize,
    },

    #[error("{aux}: attach and detach must belong to the same class ({attach_class} != {detach_class})")]
    RoleConsistency {
        aux: String,
        attach_class: String,
        detach_class: String,
    },

    #[error("{aux}: subject {subject} is an interface and neither attach nor detach names a concrete class")]
    AbstractSubject { aux: String, subject: String },

    #[error("{method}: no comparison fact covers '{left}' and '{right}'")]
    MissingFact {
        method: String,
        left: String,
        right: String,
    },

    #[error("Malformed trace fact '{line}': {reason}")]
    MalformedFact { line: String, reason: String },

    #[error("Structural contract violated at {location}: {detail}")]
    StructuralContract { location: String, detail: String },

    #[error("Unknown auxiliary dispatcher: {name}")]
    UnknownAux { name: String },

    #[error("Invalid trace pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn missing_role(aux: &str, hole: &str) -> Self {
        Self::MissingRole {
            aux: aux.to_string(),
            hole: hole.to_string(),
        }
    }

    pub fn structural(location: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::StructuralContract {
            location: location.into(),
            detail: detail.into(),
        }
    }

    pub fn unknown_aux(name: &str) -> Self {
        Self::UnknownAux {
            name: name.to_string(),
        }
    }
}

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;
