//! Write acknowledgement types.

use std::fmt;

/// The result of a single store write.
///
/// Consumed synchronously by the persistence protocol immediately after
/// each write call; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Number of documents the write matched.
    pub matched: u64,
    /// Number of documents the write modified.
    pub modified: u64,
    /// Error message reported by the store, if any.
    pub error: Option<String>,
}

impl WriteOutcome {
    /// An acknowledged write that touched nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// An acknowledged write with the given counts.
    #[must_use]
    pub fn counts(matched: u64, modified: u64) -> Self {
        Self {
            matched,
            modified,
            error: None,
        }
    }

    /// A write the store rejected with an error message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            matched: 0,
            modified: 0,
            error: Some(message.into()),
        }
    }

    /// Returns `true` if the store reported an error for this write.
    #[must_use]
    pub fn had_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The acknowledgement level requested for writes against a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteConcern {
    /// Fire and forget; errors are never surfaced.
    Unacknowledged,
    /// The store accepted the write, but the error signal is not consulted.
    Weak,
    /// The last-write-error signal is read after every write.
    #[default]
    Acknowledged,
}

impl fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteConcern::Unacknowledged => write!(f, "unacknowledged"),
            WriteConcern::Weak => write!(f, "weak"),
            WriteConcern::Acknowledged => write!(f, "acknowledged"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_constructors() {
        assert!(!WriteOutcome::none().had_error());
        assert_eq!(WriteOutcome::counts(2, 1).matched, 2);
        assert!(WriteOutcome::failed("boom").had_error());
    }

    #[test]
    fn default_concern_is_acknowledged() {
        assert_eq!(WriteConcern::default(), WriteConcern::Acknowledged);
    }
}
