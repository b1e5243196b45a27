//! Batch key resolution.

use super::Datastore;
use crate::codec::EntityCodec;
use crate::error::{Error, Result};
use crate::key::{refs_to_keys, DocRef, Key};
use crate::query::in_filter;
use docmap_document::{Document, Value, ID_FIELD};
use std::collections::HashMap;
use tracing::trace;

impl Datastore {
    /// Resolves a batch of keys to their documents.
    ///
    /// Keys are grouped by kind and each kind is fetched with a single
    /// membership-filtered query, so a batch spanning `k` kinds costs `k`
    /// store calls regardless of how many keys it holds. Results come back
    /// in input order; keys that resolve to nothing are silently dropped,
    /// so the result can be shorter than the input.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn resolve(&self, keys: &[Key]) -> Result<Vec<(Key, Document)>> {
        // Group identities per kind, keeping first-seen kind order.
        let mut kinds: Vec<(String, Vec<Value>)> = Vec::new();
        for key in keys {
            match kinds
                .iter_mut()
                .find(|(kind, _)| kind.as_str() == key.kind())
            {
                Some((_, ids)) => {
                    if !ids.contains(key.id()) {
                        ids.push(key.id().clone());
                    }
                }
                None => kinds.push((key.kind().to_string(), vec![key.id().clone()])),
            }
        }

        let mut fetched: HashMap<Key, Document> = HashMap::new();
        for (kind, ids) in kinds {
            trace!(collection = %kind, count = ids.len(), "resolving keys");
            let filter = in_filter(ID_FIELD, ids);
            for document in self
                .store()
                .find(&kind, &filter, &Document::new(), 0, 0)?
            {
                if let Some(id) = document.get(ID_FIELD).cloned() {
                    fetched.insert(Key::new(kind.clone(), id), document);
                }
            }
        }

        // Reorder to the input; unresolved keys drop out here.
        Ok(keys
            .iter()
            .filter_map(|key| {
                fetched
                    .get(key)
                    .map(|document| (key.clone(), document.clone()))
            })
            .collect())
    }

    /// Resolves a batch of keys of one kind and decodes the results.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::KindMismatch`] when any key's kind is not
    /// `T::KIND`, before any store call.
    pub fn get_by_keys<T: EntityCodec>(&self, keys: &[Key]) -> Result<Vec<T>> {
        for key in keys {
            if key.kind() != T::KIND {
                return Err(Error::KindMismatch {
                    expected: T::KIND,
                    actual: key.kind().to_string(),
                });
            }
        }
        self.resolve(keys)?
            .into_iter()
            .map(|(_, document)| T::decode(&document).map_err(Error::from))
            .collect()
    }

    /// Checks which references point at existing documents.
    ///
    /// Returns the keys of the references that resolved, in input order.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn verify_refs(&self, refs: &[DocRef]) -> Result<Vec<Key>> {
        let keys = refs_to_keys(refs);
        Ok(self
            .resolve(&keys)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }
}
