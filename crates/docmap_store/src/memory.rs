//! In-memory document store for testing.

use crate::error::{StoreError, StoreResult};
use crate::outcome::WriteOutcome;
use crate::store::DocumentStore;
use docmap_document::{Document, Value, ID_FIELD};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use uuid::Uuid;

/// An in-memory document store.
///
/// Stores all collections in memory and interprets the same filter and
/// update-body conventions a real store would:
///
/// - a filter field whose value is `{ "$in": [..] }` matches by membership,
///   any other value matches by equality, and an empty filter matches
///   everything
/// - an update body whose top-level fields all start with `$` is applied as
///   operators (`$set`, `$unset`, `$inc`); any other body replaces the
///   matched document while preserving its identity field
/// - `findandmodify` commands run atomically under the collection lock
///
/// # Test hooks
///
/// Beyond the [`DocumentStore`] contract the store exposes
/// [`op_count`](Self::op_count) (a call counter, for asserting that an
/// operation was rejected before reaching the store) and
/// [`fail_next_write`](Self::fail_next_write) (error injection for
/// exercising write-failure paths).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    last_error: Mutex<Option<String>>,
    fail_next: Mutex<Option<String>>,
    ops: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many store operations have been issued so far.
    #[must_use]
    pub fn op_count(&self) -> u64 {
        self.ops.load(AtomicOrdering::SeqCst)
    }

    /// Makes the next write report the given error through its outcome and
    /// the last-write-error signal, without touching any data.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    /// Returns a snapshot of every document in a collection.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes all data and resets the error signal.
    pub fn clear(&self) {
        self.collections.write().clear();
        *self.last_error.lock() = None;
    }

    fn bump(&self) {
        self.ops.fetch_add(1, AtomicOrdering::SeqCst);
    }

    /// Consumes an injected failure, recording it as the last write error.
    fn take_injected_failure(&self) -> Option<WriteOutcome> {
        let message = self.fail_next.lock().take()?;
        *self.last_error.lock() = Some(message.clone());
        Some(WriteOutcome::failed(message))
    }

    fn record_write_ok(&self) {
        *self.last_error.lock() = None;
    }

    fn matches(document: &Document, filter: &Document) -> bool {
        filter.iter().all(|(field, condition)| {
            if let Some(operators) = condition.as_document() {
                if let Some(Value::Array(allowed)) = operators.get("$in") {
                    return document
                        .get(field)
                        .is_some_and(|value| allowed.contains(value));
                }
            }
            document.get(field) == Some(condition)
        })
    }

    fn is_operator_body(body: &Document) -> bool {
        !body.is_empty() && body.field_names().all(|name| name.starts_with('$'))
    }

    fn apply_update(target: &mut Document, body: &Document) {
        if Self::is_operator_body(body) {
            for (operator, argument) in body.iter() {
                let Some(fields) = argument.as_document() else {
                    continue;
                };
                match operator {
                    "$set" => {
                        for (field, value) in fields.iter() {
                            target.insert(field, value.clone());
                        }
                    }
                    "$unset" => {
                        for (field, _) in fields.iter() {
                            target.remove(field);
                        }
                    }
                    "$inc" => {
                        for (field, delta) in fields.iter() {
                            let current = target
                                .get(field)
                                .and_then(Value::as_integer)
                                .unwrap_or(0);
                            let delta = delta.as_integer().unwrap_or(0);
                            target.insert(field, current + delta);
                        }
                    }
                    _ => {}
                }
            }
        } else {
            // Full replacement keeps the stored identity.
            let id = target.get(ID_FIELD).cloned();
            *target = body.clone();
            if !target.contains(ID_FIELD) {
                if let Some(id) = id {
                    target.insert(ID_FIELD, id);
                }
            }
        }
    }

    fn apply_sort(documents: &mut [Document], sort: &Document) {
        let keys: Vec<(&str, bool)> = sort
            .iter()
            .map(|(field, direction)| (field, direction.as_integer() == Some(-1)))
            .collect();
        // Later sort keys are subordinate, so apply them first and rely on
        // stable sorting for the ones that follow.
        for (field, descending) in keys.into_iter().rev() {
            documents.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
    }

    /// Builds the seed document for an upsert that matched nothing: the
    /// equality fields of the filter plus the update body.
    fn upsert_seed(filter: &Document, body: &Document) -> Document {
        let mut seed = Document::new();
        for (field, condition) in filter.iter() {
            if condition.as_document().is_none() {
                seed.insert(field, condition.clone());
            }
        }
        Self::apply_update(&mut seed, body);
        if !seed.contains(ID_FIELD) {
            seed.insert(ID_FIELD, Uuid::new_v4().to_string());
        }
        seed
    }
}

impl DocumentStore for InMemoryStore {
    fn insert(&self, collection: &str, document: &mut Document) -> StoreResult<WriteOutcome> {
        self.bump();
        if let Some(outcome) = self.take_injected_failure() {
            return Ok(outcome);
        }

        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();

        if !document.contains(ID_FIELD) {
            document.insert(ID_FIELD, Uuid::new_v4().to_string());
        }
        let id = document.get(ID_FIELD).cloned().unwrap_or(Value::Null);

        let duplicate = documents
            .iter()
            .any(|existing| existing.get(ID_FIELD) == Some(&id));
        if duplicate {
            let message = format!("duplicate identity in {collection}: {id:?}");
            *self.last_error.lock() = Some(message.clone());
            return Ok(WriteOutcome::failed(message));
        }

        documents.push(document.clone());
        self.record_write_ok();
        Ok(WriteOutcome::none())
    }

    fn update(
        &self,
        collection: &str,
        filter: &Document,
        body: &Document,
        upsert: bool,
        multi: bool,
    ) -> StoreResult<WriteOutcome> {
        self.bump();
        if let Some(outcome) = self.take_injected_failure() {
            return Ok(outcome);
        }

        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();

        let mut touched = 0u64;
        for document in documents.iter_mut() {
            if !Self::matches(document, filter) {
                continue;
            }
            Self::apply_update(document, body);
            touched += 1;
            if !multi {
                break;
            }
        }

        if touched == 0 && upsert {
            documents.push(Self::upsert_seed(filter, body));
            self.record_write_ok();
            return Ok(WriteOutcome::counts(0, 1));
        }

        self.record_write_ok();
        Ok(WriteOutcome::counts(touched, touched))
    }

    fn remove(&self, collection: &str, filter: &Document) -> StoreResult<WriteOutcome> {
        self.bump();
        if let Some(outcome) = self.take_injected_failure() {
            return Ok(outcome);
        }

        let mut collections = self.collections.write();
        let documents = collections.entry(collection.to_string()).or_default();

        let before = documents.len();
        documents.retain(|document| !Self::matches(document, filter));
        let removed = (before - documents.len()) as u64;

        self.record_write_ok();
        Ok(WriteOutcome::counts(removed, removed))
    }

    fn find(
        &self,
        collection: &str,
        filter: &Document,
        sort: &Document,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<Document>> {
        self.bump();
        let collections = self.collections.read();
        let mut results: Vec<Document> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| Self::matches(document, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Self::apply_sort(&mut results, sort);

        let results = results.into_iter().skip(offset as usize);
        Ok(if limit > 0 {
            results.take(limit as usize).collect()
        } else {
            results.collect()
        })
    }

    fn run_command(&self, command: &Document) -> StoreResult<Document> {
        self.bump();
        let Some(collection) = command.get("findandmodify").and_then(Value::as_text) else {
            return Err(StoreError::invalid_command(format!(
                "unsupported command: {command:?}"
            )));
        };
        let collection = collection.to_string();

        let empty = Document::new();
        let filter = command
            .get("query")
            .and_then(Value::as_document)
            .unwrap_or(&empty);
        let sort = command
            .get("sort")
            .and_then(Value::as_document)
            .unwrap_or(&empty);
        let remove = command.get("remove").and_then(Value::as_bool) == Some(true);
        let return_new = command.get("new").and_then(Value::as_bool) == Some(true);

        // The whole read-then-mutate runs under the write lock, which is
        // what makes this command atomic.
        let mut collections = self.collections.write();
        let documents = collections.entry(collection).or_default();

        let mut matching: Vec<Document> = documents
            .iter()
            .filter(|document| Self::matches(document, filter))
            .cloned()
            .collect();
        Self::apply_sort(&mut matching, sort);

        let mut reply = Document::new();
        let Some(selected) = matching.into_iter().next() else {
            reply.insert("value", Value::Null);
            return Ok(reply);
        };
        let selected_id = selected.get(ID_FIELD).cloned().unwrap_or(Value::Null);

        if remove {
            documents.retain(|document| document.get(ID_FIELD) != Some(&selected_id));
            reply.insert("value", selected);
            return Ok(reply);
        }

        let Some(body) = command.get("update").and_then(Value::as_document) else {
            return Err(StoreError::invalid_command(
                "findandmodify without remove requires an update body",
            ));
        };

        let mut post_image = selected.clone();
        Self::apply_update(&mut post_image, body);
        for document in documents.iter_mut() {
            if document.get(ID_FIELD) == Some(&selected_id) {
                *document = post_image.clone();
                break;
            }
        }

        reply.insert("value", if return_new { post_image } else { selected });
        Ok(reply)
    }

    fn last_write_error(&self) -> StoreResult<Option<String>> {
        Ok(self.last_error.lock().clone())
    }

    fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        self.bump();
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| Self::matches(document, filter))
                    .count() as u64
            })
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: Vec<(&str, Value)>) -> Document {
        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    #[test]
    fn insert_assigns_identity_when_missing() {
        let store = InMemoryStore::new();
        let mut document = doc(vec![("name", Value::from("Alice"))]);

        let outcome = store.insert("users", &mut document).unwrap();
        assert!(!outcome.had_error());
        assert!(document.contains(ID_FIELD));
    }

    #[test]
    fn insert_keeps_caller_identity() {
        let store = InMemoryStore::new();
        let mut document = doc(vec![(ID_FIELD, Value::from(7i64))]);

        store.insert("users", &mut document).unwrap();
        assert_eq!(document.get(ID_FIELD), Some(&Value::Integer(7)));
    }

    #[test]
    fn insert_duplicate_identity_reports_error() {
        let store = InMemoryStore::new();
        let mut first = doc(vec![(ID_FIELD, Value::from(1i64))]);
        let mut second = doc(vec![(ID_FIELD, Value::from(1i64))]);

        assert!(!store.insert("users", &mut first).unwrap().had_error());
        let outcome = store.insert("users", &mut second).unwrap();
        assert!(outcome.had_error());
        assert!(store.last_write_error().unwrap().is_some());
    }

    #[test]
    fn successful_write_clears_error_signal() {
        let store = InMemoryStore::new();
        let mut dup = doc(vec![(ID_FIELD, Value::from(1i64))]);
        store.insert("users", &mut dup.clone()).unwrap();
        store.insert("users", &mut dup).unwrap();
        assert!(store.last_write_error().unwrap().is_some());

        let mut fresh = doc(vec![(ID_FIELD, Value::from(2i64))]);
        store.insert("users", &mut fresh).unwrap();
        assert!(store.last_write_error().unwrap().is_none());
    }

    #[test]
    fn equality_filter() {
        let store = InMemoryStore::new();
        let mut a = doc(vec![("name", Value::from("a")), ("age", Value::from(1i64))]);
        let mut b = doc(vec![("name", Value::from("b")), ("age", Value::from(2i64))]);
        store.insert("users", &mut a).unwrap();
        store.insert("users", &mut b).unwrap();

        let filter = doc(vec![("age", Value::from(2i64))]);
        let found = store
            .find("users", &filter, &Document::new(), 0, 0)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("name"), Some(&Value::Text("b".into())));
    }

    #[test]
    fn membership_filter() {
        let store = InMemoryStore::new();
        for id in 1i64..=4 {
            let mut document = doc(vec![(ID_FIELD, Value::from(id))]);
            store.insert("users", &mut document).unwrap();
        }

        let mut membership = Document::new();
        membership.insert("$in", vec![1i64, 3, 9]);
        let filter = doc(vec![(ID_FIELD, Value::from(membership))]);

        let found = store
            .find("users", &filter, &Document::new(), 0, 0)
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let store = InMemoryStore::new();
        for id in 1i64..=3 {
            let mut document = doc(vec![(ID_FIELD, Value::from(id))]);
            store.insert("users", &mut document).unwrap();
        }

        assert_eq!(store.count("users", &Document::new()).unwrap(), 3);
        store.remove("users", &Document::new()).unwrap();
        assert_eq!(store.count("users", &Document::new()).unwrap(), 0);
    }

    #[test]
    fn update_replacement_preserves_identity() {
        let store = InMemoryStore::new();
        let mut document = doc(vec![(ID_FIELD, Value::from(1i64)), ("v", Value::from(1i64))]);
        store.insert("users", &mut document).unwrap();

        let filter = doc(vec![(ID_FIELD, Value::from(1i64))]);
        let body = doc(vec![("v", Value::from(2i64))]);
        let outcome = store.update("users", &filter, &body, false, false).unwrap();
        assert_eq!(outcome.matched, 1);

        let stored = &store.documents("users")[0];
        assert_eq!(stored.get(ID_FIELD), Some(&Value::Integer(1)));
        assert_eq!(stored.get("v"), Some(&Value::Integer(2)));
    }

    #[test]
    fn update_operators() {
        let store = InMemoryStore::new();
        let mut document = doc(vec![
            (ID_FIELD, Value::from(1i64)),
            ("count", Value::from(5i64)),
            ("stale", Value::from(true)),
        ]);
        store.insert("items", &mut document).unwrap();

        let filter = doc(vec![(ID_FIELD, Value::from(1i64))]);
        let body = doc(vec![
            ("$set", Value::from(doc(vec![("name", Value::from("x"))]))),
            ("$inc", Value::from(doc(vec![("count", Value::from(2i64))]))),
            ("$unset", Value::from(doc(vec![("stale", Value::from(1i64))]))),
        ]);
        store.update("items", &filter, &body, false, false).unwrap();

        let stored = &store.documents("items")[0];
        assert_eq!(stored.get("name"), Some(&Value::Text("x".into())));
        assert_eq!(stored.get("count"), Some(&Value::Integer(7)));
        assert!(!stored.contains("stale"));
    }

    #[test]
    fn update_multi_flag() {
        let store = InMemoryStore::new();
        for id in 1i64..=3 {
            let mut document = doc(vec![(ID_FIELD, Value::from(id)), ("g", Value::from(1i64))]);
            store.insert("items", &mut document).unwrap();
        }

        let filter = doc(vec![("g", Value::from(1i64))]);
        let body = doc(vec![("$set", Value::from(doc(vec![("g", Value::from(2i64))])))]);

        let first = store.update("items", &filter, &body, false, false).unwrap();
        assert_eq!(first.matched, 1);

        let rest = store.update("items", &filter, &body, false, true).unwrap();
        assert_eq!(rest.matched, 2);
    }

    #[test]
    fn update_no_match_without_upsert() {
        let store = InMemoryStore::new();
        let filter = doc(vec![(ID_FIELD, Value::from(99i64))]);
        let body = doc(vec![("v", Value::from(1i64))]);

        let outcome = store.update("items", &filter, &body, false, false).unwrap();
        assert_eq!(outcome.matched, 0);
        assert_eq!(outcome.modified, 0);
    }

    #[test]
    fn upsert_inserts_when_nothing_matched() {
        let store = InMemoryStore::new();
        let filter = doc(vec![(ID_FIELD, Value::from(1i64))]);
        let body = doc(vec![("name", Value::from("fresh"))]);

        store.update("items", &filter, &body, true, false).unwrap();

        let stored = store.documents("items");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get(ID_FIELD), Some(&Value::Integer(1)));
        assert_eq!(stored[0].get("name"), Some(&Value::Text("fresh".into())));
    }

    #[test]
    fn find_sort_offset_limit() {
        let store = InMemoryStore::new();
        for (id, age) in [(1i64, 30i64), (2, 10), (3, 20)] {
            let mut document = doc(vec![(ID_FIELD, Value::from(id)), ("age", Value::from(age))]);
            store.insert("users", &mut document).unwrap();
        }

        let sort = doc(vec![("age", Value::from(1i64))]);
        let found = store
            .find("users", &Document::new(), &sort, 1, 1)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("age"), Some(&Value::Integer(20)));

        let sort_desc = doc(vec![("age", Value::from(-1i64))]);
        let found = store
            .find("users", &Document::new(), &sort_desc, 0, 1)
            .unwrap();
        assert_eq!(found[0].get("age"), Some(&Value::Integer(30)));
    }

    #[test]
    fn find_and_modify_remove() {
        let store = InMemoryStore::new();
        let mut document = doc(vec![(ID_FIELD, Value::from(1i64))]);
        store.insert("jobs", &mut document).unwrap();

        let mut command = Document::new();
        command.insert("findandmodify", "jobs");
        command.insert("remove", true);

        let reply = store.run_command(&command).unwrap();
        assert!(reply.get("value").and_then(Value::as_document).is_some());
        assert_eq!(store.count("jobs", &Document::new()).unwrap(), 0);
    }

    #[test]
    fn find_and_modify_returns_null_when_no_match() {
        let store = InMemoryStore::new();
        let mut command = Document::new();
        command.insert("findandmodify", "jobs");
        command.insert("remove", true);

        let reply = store.run_command(&command).unwrap();
        assert_eq!(reply.get("value"), Some(&Value::Null));
    }

    #[test]
    fn find_and_modify_update_pre_and_post_image() {
        let store = InMemoryStore::new();
        let mut document = doc(vec![(ID_FIELD, Value::from(1i64)), ("n", Value::from(1i64))]);
        store.insert("jobs", &mut document).unwrap();

        let body = doc(vec![("$inc", Value::from(doc(vec![("n", Value::from(1i64))])))]);

        let mut command = Document::new();
        command.insert("findandmodify", "jobs");
        command.insert("update", body.clone());
        let reply = store.run_command(&command).unwrap();
        // Without "new" the pre-image comes back.
        let value = reply.get("value").and_then(Value::as_document).unwrap();
        assert_eq!(value.get("n"), Some(&Value::Integer(1)));

        let mut command = Document::new();
        command.insert("findandmodify", "jobs");
        command.insert("update", body);
        command.insert("new", true);
        let reply = store.run_command(&command).unwrap();
        let value = reply.get("value").and_then(Value::as_document).unwrap();
        assert_eq!(value.get("n"), Some(&Value::Integer(3)));
    }

    #[test]
    fn unsupported_command_is_rejected() {
        let store = InMemoryStore::new();
        let mut command = Document::new();
        command.insert("collstats", "jobs");
        assert!(matches!(
            store.run_command(&command),
            Err(StoreError::InvalidCommand(_))
        ));
    }

    #[test]
    fn injected_failure_fails_exactly_one_write() {
        let store = InMemoryStore::new();
        store.fail_next_write("disk on fire");

        let mut document = doc(vec![(ID_FIELD, Value::from(1i64))]);
        let outcome = store.insert("users", &mut document).unwrap();
        assert!(outcome.had_error());
        assert_eq!(store.last_write_error().unwrap().as_deref(), Some("disk on fire"));
        assert!(store.documents("users").is_empty());

        let outcome = store.insert("users", &mut document).unwrap();
        assert!(!outcome.had_error());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_inserted_document_is_retrievable(ages in proptest::collection::vec(any::<i64>(), 1..20)) {
                let store = InMemoryStore::new();
                for (id, age) in ages.iter().enumerate() {
                    let mut document = doc(vec![
                        (ID_FIELD, Value::from(id as i64)),
                        ("age", Value::from(*age)),
                    ]);
                    store.insert("users", &mut document).unwrap();
                }

                prop_assert_eq!(
                    store.count("users", &Document::new()).unwrap(),
                    ages.len() as u64
                );
                for (id, age) in ages.iter().enumerate() {
                    let filter = doc(vec![(ID_FIELD, Value::from(id as i64))]);
                    let found = store.find("users", &filter, &Document::new(), 0, 0).unwrap();
                    prop_assert_eq!(found.len(), 1);
                    prop_assert_eq!(found[0].get("age"), Some(&Value::Integer(*age)));
                }
            }

            #[test]
            fn sorted_find_orders_by_field(ages in proptest::collection::vec(-1000i64..1000, 0..20)) {
                let store = InMemoryStore::new();
                for age in &ages {
                    let mut document = doc(vec![("age", Value::from(*age))]);
                    store.insert("users", &mut document).unwrap();
                }

                let sort = doc(vec![("age", Value::from(1i64))]);
                let found = store.find("users", &Document::new(), &sort, 0, 0).unwrap();
                let seen: Vec<i64> = found
                    .iter()
                    .filter_map(|document| document.get("age").and_then(Value::as_integer))
                    .collect();

                let mut expected = ages.clone();
                expected.sort_unstable();
                prop_assert_eq!(seen, expected);
            }
        }
    }

    #[test]
    fn op_count_tracks_calls() {
        let store = InMemoryStore::new();
        assert_eq!(store.op_count(), 0);

        let mut document = doc(vec![(ID_FIELD, Value::from(1i64))]);
        store.insert("users", &mut document).unwrap();
        store.find("users", &Document::new(), &Document::new(), 0, 0).unwrap();
        store.count("users", &Document::new()).unwrap();

        assert_eq!(store.op_count(), 3);
    }
}
