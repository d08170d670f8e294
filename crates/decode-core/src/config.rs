/*!
# Decoder Configuration

Naming conventions shared with the skeleton builder, plus the per-event
expectations on how many attach/detach/handle methods a pattern instance has.
Both load from JSON; every field has a default so partial files are fine.
*/

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Conventions the skeleton builder used when emitting the generic code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Prefix of every auxiliary dispatcher class name
    pub aux_marker: String,
    /// Generic observer collection name; the concrete one appends `_<Observer>`
    pub collection_prefix: String,
    /// Collection type for the observer list
    pub collection_type: String,
    /// Statements in initializers containing this token are scaffolding
    pub tmp_marker: String,
    /// Producer-name prefixes whose expression facts are kept
    pub roles_of_interest: Vec<String>,
    /// Maximum statement nesting the traversal will follow
    pub max_depth: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            aux_marker: "AuxObserver".to_string(),
            collection_prefix: "_obs".to_string(),
            collection_type: "LinkedList".to_string(),
            tmp_marker: "_tmp".to_string(),
            roles_of_interest: ["subject", "observer", "attach", "detach", "handle", "update"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            max_depth: 256,
        }
    }
}

impl DecodeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Lower-cased marker used by generic identifiers such as `auxobserver...`
    pub fn aux_marker_lower(&self) -> String {
        self.aux_marker.to_lowercase()
    }

    /// Concrete collection field name for an observer class
    pub fn collection_name(&self, observer: &str) -> String {
        format!("{}_{}", self.collection_prefix, observer)
    }

    /// Collection type parameterized by the observer class
    pub fn collection_type_of(&self, observer: &str) -> String {
        format!("{}<{}>", self.collection_type, observer)
    }
}

/// Expected method counts for one event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub handle: u32,
    pub attach: u32,
    pub detach: u32,
}

impl Default for EventCounts {
    fn default() -> Self {
        Self {
            handle: 1,
            attach: 1,
            detach: 1,
        }
    }
}

/// Per-event configuration keyed by Event class name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventConfig {
    events: IndexMap<String, EventCounts>,
}

impl EventConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: impl Into<String>, counts: EventCounts) -> Self {
        self.events.insert(event.into(), counts);
        self
    }

    /// Counts for an event; `(1, 1, 1)` when it has no entry
    pub fn counts(&self, event: &str) -> EventCounts {
        self.events.get(event).copied().unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() -> anyhow::Result<()> {
        let config = DecodeConfig::from_json(r#"{ "tmp_marker": "__scratch" }"#)?;
        assert_eq!(config.tmp_marker, "__scratch");
        assert_eq!(config.aux_marker, "AuxObserver");
        assert_eq!(config.roles_of_interest.len(), 6);
        assert_eq!(config.collection_name("Listener"), "_obs_Listener");
        assert_eq!(config.collection_type_of("Listener"), "LinkedList<Listener>");
        Ok(())
    }

    #[test]
    fn test_event_counts_default_to_one() -> anyhow::Result<()> {
        let events = EventConfig::from_json(
            r#"{ "KeyEvent": { "handle": 1, "attach": 0, "detach": 0 } }"#,
        )?;
        assert_eq!(
            events.counts("KeyEvent"),
            EventCounts {
                handle: 1,
                attach: 0,
                detach: 0
            }
        );
        assert_eq!(events.counts("ActionEvent"), EventCounts::default());
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("events.json");
        std::fs::write(&path, r#"{ "ActionEvent": { "handle": 1, "attach": 1, "detach": 0 } }"#)?;

        let events = EventConfig::load(&path)?;
        assert_eq!(events.counts("ActionEvent").detach, 0);

        let missing = DecodeConfig::load(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(crate::DecodeError::Io(_))));
        Ok(())
    }
}
