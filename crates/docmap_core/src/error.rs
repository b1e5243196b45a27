//! Error types for the persistence protocol.

use docmap_document::Value;
use thiserror::Error;

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors that can occur in the persistence protocol.
///
/// Every variant is an immediate failure of the call that raised it.
/// Nothing here is caught and downgraded internally and nothing is retried
/// automatically; retry policy belongs to the caller (or, for transport
/// failures, to the store boundary).
#[derive(Debug, Error)]
pub enum Error {
    /// An entity lacks a resolvable identity where one was required.
    #[error("could not get an identity for {type_name}")]
    IdentityMissing {
        /// Name of the entity type.
        type_name: &'static str,
    },

    /// The store accepted a write but the document carries no identity
    /// afterwards. This indicates a mapping or integration bug.
    #[error("missing identity after write into {kind}")]
    IdentityNotAssigned {
        /// Collection kind that was written to.
        kind: String,
    },

    /// The store reported an error on the last write.
    #[error("write failed: {message}")]
    WriteFailed {
        /// The store-reported message.
        message: String,
    },

    /// An optimistic version check lost the race: another writer advanced
    /// the version between this caller's read and its write. Re-read and
    /// retry at a higher level.
    #[error("entity in {kind} (id={id:?}, version={version}) was concurrently modified")]
    ConcurrentModification {
        /// Collection kind of the entity.
        kind: String,
        /// Identity of the entity.
        id: Value,
        /// The version this caller read before writing.
        version: u64,
    },

    /// A query with a sort, offset, or limit was used as an update target.
    #[error("invalid update query: {reason}")]
    InvalidUpdateQuery {
        /// Which constraint made the query invalid.
        reason: &'static str,
    },

    /// A type descriptor was passed where an entity instance was expected.
    #[error(
        "delete was given the type descriptor {type_name}; \
         did you mean to delete all documents with an empty-filter query?"
    )]
    DeleteOnClass {
        /// Name of the entity type.
        type_name: &'static str,
    },

    /// A key's kind does not match the requested entity type's kind.
    #[error("collection kinds don't match: expected {expected}, got {actual}")]
    KindMismatch {
        /// Kind of the requested entity type.
        expected: &'static str,
        /// Kind carried by the key.
        actual: String,
    },

    /// Store boundary error.
    #[error("store error: {0}")]
    Store(#[from] docmap_store::StoreError),

    /// Codec boundary error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl Error {
    /// Creates an identity-missing error for an entity type.
    pub fn identity_missing(type_name: &'static str) -> Self {
        Self::IdentityMissing { type_name }
    }

    /// Creates a post-write identity error.
    pub fn identity_not_assigned(kind: impl Into<String>) -> Self {
        Self::IdentityNotAssigned { kind: kind.into() }
    }

    /// Creates a write-failed error from a store message.
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a concurrent-modification error.
    pub fn concurrent_modification(kind: impl Into<String>, id: Value, version: u64) -> Self {
        Self::ConcurrentModification {
            kind: kind.into(),
            id,
            version,
        }
    }
}

/// Errors raised at the codec boundary while converting between entities
/// and documents.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A required field was absent from the document.
    #[error("missing field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field held a value of an unexpected type.
    #[error("invalid type for field {field}: expected {expected}")]
    InvalidType {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the expected type.
        expected: &'static str,
    },

    /// Any other conversion failure.
    #[error("codec failure: {message}")]
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl CodecError {
    /// Creates a missing-field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Creates an invalid-type error.
    pub fn invalid_type(field: &'static str, expected: &'static str) -> Self {
        Self::InvalidType { field, expected }
    }

    /// Creates a generic codec error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}
