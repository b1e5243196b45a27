//! Entity codec boundary.
//!
//! The persistence core never reflects over entity types. Everything it
//! needs — collection kind, identity access, version access, encoding and
//! decoding, lifecycle notification — comes through [`EntityCodec`], an
//! explicit capability implemented per entity type.

use crate::error::CodecResult;
use docmap_document::{Document, Value};
use std::fmt;

/// Descriptor for an entity type: its collection kind, its Rust type name,
/// and the name of its version field if it has one.
///
/// Obtainable without an instance via [`EntityCodec::entity_type`]. Types
/// with a version field go through the optimistic versioning protocol on
/// save; types without one are saved unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    /// Collection kind this type persists into.
    pub kind: &'static str,
    /// The entity's Rust type name, for diagnostics.
    pub name: &'static str,
    /// Document field that carries the optimistic version, if any.
    pub version_field: Option<&'static str>,
}

impl EntityType {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(
        kind: &'static str,
        name: &'static str,
        version_field: Option<&'static str>,
    ) -> Self {
        Self {
            kind,
            name,
            version_field,
        }
    }

    /// Returns `true` if this type participates in optimistic versioning.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.version_field.is_some()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (kind {})", self.name, self.kind)
    }
}

/// Callback fired for a nested entity once the outer write is acknowledged.
pub type PostPersistFn = Box<dyn FnMut(&Document) + Send>;

/// Ordered collection of nested entities discovered while encoding a root
/// entity.
///
/// The codec appends one entry per nested entity in encounter order, pairing
/// a post-persist callback with the document that was encoded for it. The
/// write protocol replays the entries in that exact order after the outer
/// write is durably acknowledged — and never on a failed write. Codecs must
/// perform their own cycle detection: an already-visited instance is not
/// encoded (or pushed) again.
#[derive(Default)]
pub struct InvolvedObjects {
    entries: Vec<(PostPersistFn, Document)>,
}

impl InvolvedObjects {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a nested entity's callback and encoded document.
    pub fn push(&mut self, callback: PostPersistFn, document: Document) {
        self.entries.push((callback, document));
    }

    /// Returns the number of nested entities recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no nested entities were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fires every callback in encounter order.
    ///
    /// Called by the write protocol exactly once per successful write.
    pub(crate) fn notify_persisted(&mut self) {
        for (callback, document) in &mut self.entries {
            callback(document);
        }
    }
}

impl fmt::Debug for InvolvedObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvolvedObjects")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

/// Trait for types that persist as documents.
///
/// Implementors provide the full codec capability for one entity type:
/// identity and version field access, document conversion, and the
/// post-persist lifecycle hook. The identity value is type-erased into a
/// [`Value`] so any scalar identity shape works without reflection.
///
/// # Example
///
/// ```rust,ignore
/// use docmap_core::{CodecResult, EntityCodec, InvolvedObjects};
/// use docmap_document::{Document, Value, ID_FIELD};
///
/// struct User {
///     id: Option<Value>,
///     name: String,
/// }
///
/// impl EntityCodec for User {
///     const KIND: &'static str = "users";
///
///     fn encode(&self) -> CodecResult<(Document, InvolvedObjects)> {
///         let mut doc = Document::new();
///         if let Some(id) = &self.id {
///             doc.insert(ID_FIELD, id.clone());
///         }
///         doc.insert("name", self.name.as_str());
///         Ok((doc, InvolvedObjects::new()))
///     }
///
///     fn decode(document: &Document) -> CodecResult<Self> {
///         // ... read fields from the document
///     }
///
///     fn id(&self) -> Option<Value> {
///         self.id.clone()
///     }
///
///     fn set_id(&mut self, id: Value) {
///         self.id = Some(id);
///     }
/// }
/// ```
pub trait EntityCodec: Sized {
    /// Collection kind this type persists into.
    const KIND: &'static str;

    /// Document field carrying the optimistic version, if this type is
    /// versioned.
    const VERSION_FIELD: Option<&'static str> = None;

    /// Returns this type's descriptor.
    #[must_use]
    fn entity_type() -> EntityType {
        EntityType::new(
            Self::KIND,
            std::any::type_name::<Self>(),
            Self::VERSION_FIELD,
        )
    }

    /// Encodes the entity to a document, capturing nested entities.
    ///
    /// The returned document must include the identity field when
    /// [`id`](Self::id) is `Some`. When the identity is a simple scalar the
    /// store cannot assign, the codec must supply one client-side here.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be represented as a document.
    fn encode(&self) -> CodecResult<(Document, InvolvedObjects)>;

    /// Decodes an entity from a document.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or mistyped.
    fn decode(document: &Document) -> CodecResult<Self>;

    /// Returns the entity's identity value, if assigned.
    fn id(&self) -> Option<Value>;

    /// Writes a store-confirmed identity back onto the entity.
    fn set_id(&mut self, id: Value);

    /// Returns the entity's current version, if it carries one.
    ///
    /// `None` (or zero) means "never persisted".
    fn version(&self) -> Option<u64> {
        None
    }

    /// Writes a new version back onto the entity after a successful save.
    fn set_version(&mut self, _version: u64) {}

    /// Lifecycle hook fired once after the entity's write is acknowledged.
    fn post_persist(&mut self, _document: &Document) {}
}
