//! Query and update-operation contracts.
//!
//! The core does not own a query DSL. [`Query`] is the narrow contract it
//! consumes: a filter document, a sort document, an offset, and a limit,
//! tied to an entity type. [`UpdateOps`] is the matching contract for
//! update bodies.

use crate::codec::EntityCodec;
use docmap_document::{Document, Value, ID_FIELD};
use std::marker::PhantomData;

/// Builds the membership filter `field IN values`.
pub(crate) fn in_filter(field: &str, values: Vec<Value>) -> Document {
    let mut membership = Document::new();
    membership.insert("$in", Value::Array(values));
    let mut filter = Document::new();
    filter.insert(field, membership);
    filter
}

/// Builds the equality filter `_id == id`.
pub(crate) fn id_filter(id: Value) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD, id);
    filter
}

/// A query over one entity type's collection.
///
/// Carries exactly what the persistence core consumes: the filter document,
/// the sort document, an offset, and a limit. An empty filter matches every
/// document in the collection — intentionally, and without a guard.
#[derive(Debug, Clone)]
pub struct Query<T> {
    filter: Document,
    sort: Document,
    offset: u64,
    limit: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: EntityCodec> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EntityCodec> Query<T> {
    /// Creates an unconstrained query (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self {
            filter: Document::new(),
            sort: Document::new(),
            offset: 0,
            limit: 0,
            _marker: PhantomData,
        }
    }

    /// Adds an equality constraint on a field.
    #[must_use]
    pub fn filter_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field, value);
        self
    }

    /// Adds a membership constraint: `field IN values`.
    #[must_use]
    pub fn filter_in(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let mut membership = Document::new();
        membership.insert("$in", Value::Array(values));
        self.filter.insert(field, membership);
        self
    }

    /// Sorts ascending by a field.
    #[must_use]
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort.insert(field, 1i64);
        self
    }

    /// Sorts descending by a field.
    #[must_use]
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.insert(field, -1i64);
        self
    }

    /// Skips the first `offset` results.
    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Bounds the result count; zero means unbounded.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// The collection kind this query targets.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        T::KIND
    }

    /// The filter document.
    #[must_use]
    pub fn filter_document(&self) -> &Document {
        &self.filter
    }

    /// The sort document.
    #[must_use]
    pub fn sort_document(&self) -> &Document {
        &self.sort
    }

    /// The result offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The result limit (zero = unbounded).
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// Builder for operator-style update bodies (`$set`, `$unset`, `$inc`).
#[derive(Debug, Clone, Default)]
pub struct UpdateOps {
    set: Document,
    unset: Document,
    inc: Document,
}

impl UpdateOps {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field to a value.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field, value);
        self
    }

    /// Removes a field.
    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.insert(field, 1i64);
        self
    }

    /// Increments an integer field by `delta`.
    #[must_use]
    pub fn inc(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.inc.insert(field, delta);
        self
    }

    /// Renders the operator document the store consumes.
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut ops = Document::new();
        if !self.set.is_empty() {
            ops.insert("$set", self.set);
        }
        if !self.unset.is_empty() {
            ops.insert("$unset", self.unset);
        }
        if !self.inc.is_empty() {
            ops.insert("$inc", self.inc);
        }
        ops
    }
}
