//! Write protocol: insert, save, and the optimistic versioning path.

use super::Datastore;
use crate::codec::{EntityCodec, InvolvedObjects};
use crate::error::{Error, Result};
use crate::key::Key;
use crate::query::id_filter;
use docmap_document::{Document, ID_FIELD};
use docmap_store::WriteConcern;
use tracing::trace;

impl Datastore {
    /// Persists a new entity with insert semantics.
    ///
    /// Encodes, writes, verifies identity assignment, checks the write
    /// acknowledgement, then runs post-write side effects. Versioned types
    /// are stamped with the first version before the write goes out.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IdentityNotAssigned`] when the store confirms
    /// the write but no identity is present afterwards, and with
    /// [`Error::WriteFailed`] when an acknowledged write reports an error.
    pub fn insert<T: EntityCodec>(&self, entity: &mut T) -> Result<Key> {
        let (mut document, mut involved) = entity.encode()?;
        let new_version = stamp_first_version::<T>(&mut document);

        trace!(collection = T::KIND, "insert");
        self.store().insert(T::KIND, &mut document)?;

        self.finish_write(entity, &document, &mut involved, new_version)
    }

    /// Inserts a batch of entities, returning their keys in input order.
    ///
    /// Each entity goes through the full insert protocol individually; the
    /// first failure aborts the batch, leaving earlier entities persisted.
    ///
    /// # Errors
    ///
    /// Fails as [`Datastore::insert`] does, on the first failing entity.
    pub fn insert_all<T: EntityCodec>(&self, entities: &mut [T]) -> Result<Vec<Key>> {
        entities.iter_mut().map(|entity| self.insert(entity)).collect()
    }

    /// Persists an entity with save semantics.
    ///
    /// Unversioned types are written unconditionally: an entity without an
    /// identity is inserted, one with an identity is upserted by identity.
    /// Versioned types go through the optimistic protocol instead, where a
    /// save of a stale copy fails with
    /// [`Error::ConcurrentModification`] and changes nothing.
    ///
    /// # Errors
    ///
    /// Fails as [`Datastore::insert`] does, plus
    /// [`Error::ConcurrentModification`] for stale versioned saves.
    pub fn save<T: EntityCodec>(&self, entity: &mut T) -> Result<Key> {
        match T::VERSION_FIELD {
            Some(version_field) => self.save_versioned(entity, version_field),
            None => self.save_unversioned(entity),
        }
    }

    /// Saves a batch of entities, returning their keys in input order.
    ///
    /// # Errors
    ///
    /// Fails as [`Datastore::save`] does, on the first failing entity.
    pub fn save_all<T: EntityCodec>(&self, entities: &mut [T]) -> Result<Vec<Key>> {
        entities.iter_mut().map(|entity| self.save(entity)).collect()
    }

    fn save_unversioned<T: EntityCodec>(&self, entity: &mut T) -> Result<Key> {
        let (mut document, mut involved) = entity.encode()?;

        match document.get(ID_FIELD).cloned() {
            Some(id) => {
                trace!(collection = T::KIND, "save as upsert");
                let filter = id_filter(id);
                self.store().update(T::KIND, &filter, &document, true, false)?;
            }
            None => {
                trace!(collection = T::KIND, "save as insert");
                self.store().insert(T::KIND, &mut document)?;
            }
        }

        self.finish_write(entity, &document, &mut involved, None)
    }

    /// The optimistic versioning protocol.
    ///
    /// A fresh entity (version absent or zero) is stamped with version one
    /// and written unconditionally. A previously persisted entity is written
    /// through a conditional update whose filter matches both the identity
    /// and the old version; when that matches nothing, another writer got
    /// there first and the save fails without modifying anything.
    fn save_versioned<T: EntityCodec>(
        &self,
        entity: &mut T,
        version_field: &'static str,
    ) -> Result<Key> {
        let (mut document, mut involved) = entity.encode()?;
        let old_version = entity.version().unwrap_or(0);
        let new_version = old_version + 1;
        document.insert(version_field, new_version as i64);

        if old_version == 0 {
            match document.get(ID_FIELD).cloned() {
                Some(id) => {
                    trace!(collection = T::KIND, "first versioned save as upsert");
                    let filter = id_filter(id);
                    self.store().update(T::KIND, &filter, &document, true, false)?;
                }
                None => {
                    trace!(collection = T::KIND, "first versioned save as insert");
                    self.store().insert(T::KIND, &mut document)?;
                }
            }
        } else {
            let id = document
                .get(ID_FIELD)
                .cloned()
                .ok_or_else(|| Error::identity_missing(std::any::type_name::<T>()))?;

            let mut filter = id_filter(id.clone());
            filter.insert(version_field, old_version as i64);

            trace!(
                collection = T::KIND,
                old_version,
                "conditional versioned save"
            );
            let outcome = self.store().update(T::KIND, &filter, &document, false, false)?;
            if let Some(message) = outcome.error {
                return Err(Error::write_failed(message));
            }
            if outcome.matched == 0 {
                return Err(Error::concurrent_modification(T::KIND, id, old_version));
            }
        }

        self.finish_write(entity, &document, &mut involved, Some(new_version))
    }

    /// Shared tail of every write: identity check, acknowledgement check,
    /// then post-write side effects in their fixed order.
    fn finish_write<T: EntityCodec>(
        &self,
        entity: &mut T,
        document: &Document,
        involved: &mut InvolvedObjects,
        new_version: Option<u64>,
    ) -> Result<Key> {
        let id = document
            .get(ID_FIELD)
            .filter(|id| !id.is_null())
            .cloned()
            .ok_or_else(|| Error::identity_not_assigned(T::KIND))?;

        self.check_acknowledgement(T::KIND)?;

        // Side effects run only past this point, and only once.
        entity.set_id(id.clone());
        if let Some(version) = new_version {
            entity.set_version(version);
        }
        involved.notify_persisted();
        entity.post_persist(document);

        Ok(Key::for_entity_type::<T>(id))
    }

    /// Consults the store's error signal when the effective write concern
    /// asks for it.
    fn check_acknowledgement(&self, kind: &str) -> Result<()> {
        if self.config().concern_for(kind) == WriteConcern::Acknowledged {
            if let Some(message) = self.store().last_write_error()? {
                return Err(Error::write_failed(message));
            }
        }
        Ok(())
    }
}

/// Stamps version one onto a fresh versioned document; returns the version
/// to write back, or `None` for unversioned types.
fn stamp_first_version<T: EntityCodec>(document: &mut Document) -> Option<u64> {
    let version_field = T::VERSION_FIELD?;
    document.insert(version_field, 1i64);
    Some(1)
}
