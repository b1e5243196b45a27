//! Datastore configuration.

use docmap_store::WriteConcern;
use std::collections::HashMap;

/// Configuration for constructing a datastore.
#[derive(Debug, Clone)]
pub struct Config {
    /// Write concern applied to collections without an override.
    pub write_concern: WriteConcern,

    /// Per-kind write concern overrides.
    pub kind_write_concerns: HashMap<String, WriteConcern>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_concern: WriteConcern::Acknowledged,
            kind_write_concerns: HashMap::new(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default write concern.
    #[must_use]
    pub fn write_concern(mut self, concern: WriteConcern) -> Self {
        self.write_concern = concern;
        self
    }

    /// Overrides the write concern for one collection kind.
    #[must_use]
    pub fn kind_write_concern(mut self, kind: impl Into<String>, concern: WriteConcern) -> Self {
        self.kind_write_concerns.insert(kind.into(), concern);
        self
    }

    /// The write concern in effect for a collection kind.
    #[must_use]
    pub fn concern_for(&self, kind: &str) -> WriteConcern {
        self.kind_write_concerns
            .get(kind)
            .copied()
            .unwrap_or(self.write_concern)
    }
}
