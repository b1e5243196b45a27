//! Update and delete dispatch.

use super::Datastore;
use crate::codec::{EntityCodec, EntityType};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::query::{id_filter, in_filter, Query};
use docmap_document::{Document, Value, ID_FIELD};
use docmap_store::WriteOutcome;
use tracing::trace;

/// What a delete call was given: a concrete entity key, or a bare type
/// descriptor.
///
/// The descriptor form is always rejected. Deleting "the type" is almost
/// certainly a programming slip, and its plausible reading (drop every
/// document of the kind) is expressed explicitly with an empty-filter
/// [`Query`] instead.
#[derive(Debug, Clone)]
pub enum DeleteTarget {
    /// Delete the single entity this key identifies.
    Entity(Key),
    /// A type descriptor; rejected with [`Error::DeleteOnClass`].
    Descriptor(EntityType),
}

impl From<Key> for DeleteTarget {
    fn from(key: Key) -> Self {
        Self::Entity(key)
    }
}

impl From<EntityType> for DeleteTarget {
    fn from(descriptor: EntityType) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl Datastore {
    /// Applies an update body to every document matching the query.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidUpdateQuery`] before any store call when
    /// the query carries a sort, offset, or limit.
    pub fn update<T: EntityCodec>(
        &self,
        query: &Query<T>,
        body: &Document,
    ) -> Result<WriteOutcome> {
        self.dispatch_update(query, body, false, true)
    }

    /// Applies an update body to every match, inserting a seed document
    /// when nothing matched.
    ///
    /// # Errors
    ///
    /// Fails as [`Datastore::update`] does.
    pub fn update_upsert<T: EntityCodec>(
        &self,
        query: &Query<T>,
        body: &Document,
    ) -> Result<WriteOutcome> {
        self.dispatch_update(query, body, true, true)
    }

    /// Applies an update body to the first document matching the query.
    ///
    /// # Errors
    ///
    /// Fails as [`Datastore::update`] does.
    pub fn update_first<T: EntityCodec>(
        &self,
        query: &Query<T>,
        body: &Document,
    ) -> Result<WriteOutcome> {
        self.dispatch_update(query, body, false, false)
    }

    /// Applies an update body to the first match, inserting a seed document
    /// when nothing matched.
    ///
    /// # Errors
    ///
    /// Fails as [`Datastore::update`] does.
    pub fn update_first_upsert<T: EntityCodec>(
        &self,
        query: &Query<T>,
        body: &Document,
    ) -> Result<WriteOutcome> {
        self.dispatch_update(query, body, true, false)
    }

    /// Validates the query shape, then hands the update to the store.
    ///
    /// Result shaping (sort, offset, limit) has no meaning for an update
    /// target, so its presence is treated as a misuse rather than silently
    /// ignored. Validation happens before the store is touched.
    fn dispatch_update<T: EntityCodec>(
        &self,
        query: &Query<T>,
        body: &Document,
        upsert: bool,
        multi: bool,
    ) -> Result<WriteOutcome> {
        if !query.sort_document().is_empty() {
            return Err(Error::InvalidUpdateQuery {
                reason: "a sort is not allowed for updates",
            });
        }
        if query.offset() > 0 {
            return Err(Error::InvalidUpdateQuery {
                reason: "an offset is not allowed for updates",
            });
        }
        if query.limit() > 0 {
            return Err(Error::InvalidUpdateQuery {
                reason: "a limit is not allowed for updates",
            });
        }

        trace!(collection = T::KIND, upsert, multi, "update");
        Ok(self
            .store()
            .update(T::KIND, query.filter_document(), body, upsert, multi)?)
    }

    /// Deletes the entity a target identifies.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DeleteOnClass`] when given a type descriptor,
    /// without touching the store.
    pub fn delete(&self, target: impl Into<DeleteTarget>) -> Result<()> {
        match target.into() {
            DeleteTarget::Descriptor(descriptor) => Err(Error::DeleteOnClass {
                type_name: descriptor.name,
            }),
            DeleteTarget::Entity(key) => {
                trace!(collection = key.kind(), "delete by key");
                self.store()
                    .remove(key.kind(), &id_filter(key.id().clone()))?;
                Ok(())
            }
        }
    }

    /// Deletes an entity instance by its identity.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IdentityMissing`] when the entity carries no
    /// identity.
    pub fn delete_entity<T: EntityCodec>(&self, entity: &T) -> Result<()> {
        let key = self.key_of(entity)?;
        self.delete(key)
    }

    /// Deletes one document of kind `T` by identity.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn delete_by_id<T: EntityCodec>(&self, id: impl Into<Value>) -> Result<()> {
        trace!(collection = T::KIND, "delete by id");
        self.store().remove(T::KIND, &id_filter(id.into()))?;
        Ok(())
    }

    /// Deletes every document of kind `T` whose identity is in `ids`, in a
    /// single membership-filtered store call. An empty id list is a no-op.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn delete_by_ids<T: EntityCodec>(
        &self,
        ids: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<()> {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(());
        }
        trace!(collection = T::KIND, count = ids.len(), "delete by ids");
        self.store().remove(T::KIND, &in_filter(ID_FIELD, ids))?;
        Ok(())
    }

    /// Deletes every document matching a query's filter.
    ///
    /// An empty filter deletes the whole collection; that is the explicit
    /// spelling for "drop everything of this kind".
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn delete_query<T: EntityCodec>(&self, query: &Query<T>) -> Result<()> {
        trace!(collection = T::KIND, "delete by query");
        self.store().remove(T::KIND, query.filter_document())?;
        Ok(())
    }
}
