//! Key and reference identity model.

use crate::codec::EntityCodec;
use docmap_document::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of one persisted entity: a collection kind plus an identity
/// value.
///
/// Two keys are equal iff `kind` and `id` compare equal. The optional
/// `type_name` is diagnostic metadata and never part of equality or
/// hashing. The kind is always resolved through the codec at construction
/// (see [`Key::for_entity_type`]), so any two keys compare on resolved
/// kinds.
///
/// Keys are immutable once constructed.
#[derive(Debug, Clone)]
pub struct Key {
    kind: String,
    id: Value,
    type_name: Option<&'static str>,
}

impl Key {
    /// Creates a key from a resolved kind and identity value.
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            type_name: None,
        }
    }

    /// Creates a key for an entity type, resolving the kind through the
    /// codec and recording the type name as metadata.
    #[must_use]
    pub fn for_entity_type<T: EntityCodec>(id: impl Into<Value>) -> Self {
        Self {
            kind: T::KIND.to_string(),
            id: id.into(),
            type_name: Some(std::any::type_name::<T>()),
        }
    }

    /// Creates a key from a reference. Loss-free: kind and id carry over
    /// exactly.
    #[must_use]
    pub fn from_ref(reference: &DocRef) -> Self {
        Self::new(reference.kind(), reference.id().clone())
    }

    /// The collection kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The identity value.
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.id
    }

    /// The entity type name, when the key was built from a typed call site.
    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name
    }

    /// Converts this key to a reference. Loss-free both directions.
    #[must_use]
    pub fn to_ref(&self) -> DocRef {
        DocRef::new(self.kind.clone(), self.id.clone())
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        // type_name is metadata only.
        self.kind == other.kind && self.id == other.id
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:?}", self.kind, self.id)
    }
}

impl From<DocRef> for Key {
    fn from(reference: DocRef) -> Self {
        Self::new(reference.kind, reference.id)
    }
}

/// A store-native pointer to a document: `(kind, id)`.
///
/// References are the form identity takes inside stored documents. They
/// are isomorphic to [`Key`]s; conversion in either direction preserves
/// kind and id exactly. The lazy-fetch capability lives on the datastore
/// (`get_by_ref`), keeping the reference itself a plain value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocRef {
    kind: String,
    id: Value,
}

impl DocRef {
    /// Creates a reference from a kind and identity value.
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a reference from a key.
    #[must_use]
    pub fn from_key(key: &Key) -> Self {
        key.to_ref()
    }

    /// The collection kind the reference points into.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The identity value of the referenced document.
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.id
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref {}#{:?}", self.kind, self.id)
    }
}

impl From<Key> for DocRef {
    fn from(key: Key) -> Self {
        Self {
            kind: key.kind,
            id: key.id,
        }
    }
}

/// Converts a list of keys to references.
#[must_use]
pub fn keys_as_refs(keys: &[Key]) -> Vec<DocRef> {
    keys.iter().map(Key::to_ref).collect()
}

/// Converts a list of references to keys.
#[must_use]
pub fn refs_to_keys(refs: &[DocRef]) -> Vec<Key> {
    refs.iter().map(Key::from_ref).collect()
}
