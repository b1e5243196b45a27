//! Datastore facade: the entry point of the persistence protocol.

mod command;
mod dispatch;
mod resolve;
mod write;

pub use dispatch::DeleteTarget;

use crate::codec::EntityCodec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::key::{DocRef, Key};
use crate::query::{id_filter, Query};
use docmap_document::{Document, Value};
use docmap_store::DocumentStore;
use std::sync::Arc;
use tracing::debug;

/// A typed facade over one document store.
///
/// The datastore orchestrates the whole persistence protocol: encode
/// through the codec boundary, write through the store boundary, check
/// acknowledgements, backfill identity and version, and replay lifecycle
/// notifications. It holds no state of its own beyond the store handle and
/// configuration, and every operation is synchronous — the only suspension
/// points are the store calls themselves.
///
/// Store access is always passed in explicitly; there is no process-wide
/// "current datastore" registration. Construct as many datastores over as
/// many stores as needed.
///
/// # Example
///
/// ```rust,ignore
/// use docmap_core::Datastore;
/// use docmap_store::InMemoryStore;
/// use std::sync::Arc;
///
/// let datastore = Datastore::new(Arc::new(InMemoryStore::new()));
///
/// let mut user = User { id: None, name: "Alice".into() };
/// let key = datastore.insert(&mut user)?;
/// assert_eq!(Some(key.id().clone()), user.id);
/// ```
pub struct Datastore {
    store: Arc<dyn DocumentStore>,
    config: Config,
}

impl Datastore {
    /// Creates a datastore with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, Config::default())
    }

    /// Creates a datastore with the given configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        debug!(write_concern = %config.write_concern, "datastore created");
        Self { store, config }
    }

    /// Returns the datastore configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------
    // Key and reference model
    // ------------------------------------------------------------------

    /// Resolves an entity's key from its identity field.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IdentityMissing`] when the identity field is
    /// empty.
    pub fn key_of<T: EntityCodec>(&self, entity: &T) -> Result<Key> {
        let id = entity
            .id()
            .filter(|id| !id.is_null())
            .ok_or_else(|| Error::identity_missing(std::any::type_name::<T>()))?;
        Ok(Key::for_entity_type::<T>(id))
    }

    /// Creates a reference to an entity of type `T` with the given identity.
    #[must_use]
    pub fn create_ref<T: EntityCodec>(&self, id: impl Into<Value>) -> DocRef {
        DocRef::new(T::KIND, id)
    }

    /// Creates a reference from an entity instance.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IdentityMissing`] when the identity field is
    /// empty.
    pub fn create_ref_for<T: EntityCodec>(&self, entity: &T) -> Result<DocRef> {
        Ok(self.key_of(entity)?.to_ref())
    }

    // ------------------------------------------------------------------
    // Point reads
    // ------------------------------------------------------------------

    /// Runs a query and decodes every matching document.
    ///
    /// # Errors
    ///
    /// Fails on store or codec errors.
    pub fn find<T: EntityCodec>(&self, query: &Query<T>) -> Result<Vec<T>> {
        let documents = self.store.find(
            T::KIND,
            query.filter_document(),
            query.sort_document(),
            query.offset(),
            query.limit(),
        )?;
        documents
            .iter()
            .map(|document| T::decode(document).map_err(Error::from))
            .collect()
    }

    /// Fetches one entity by identity.
    ///
    /// # Errors
    ///
    /// Fails on store or codec errors.
    pub fn get_by_id<T: EntityCodec>(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let filter = id_filter(id.into());
        let mut documents = self
            .store
            .find(T::KIND, &filter, &Document::new(), 0, 1)?;
        documents
            .pop()
            .map(|document| T::decode(&document))
            .transpose()
            .map_err(Error::from)
    }

    /// Re-reads an entity's current stored state by its identity.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::IdentityMissing`] when the entity carries no
    /// identity.
    pub fn get<T: EntityCodec>(&self, entity: &T) -> Result<Option<T>> {
        let id = entity
            .id()
            .filter(|id| !id.is_null())
            .ok_or_else(|| Error::identity_missing(std::any::type_name::<T>()))?;
        self.get_by_id::<T>(id)
    }

    /// Fetches the entity a key points at.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::KindMismatch`] when the key's kind is not
    /// `T::KIND`.
    pub fn get_by_key<T: EntityCodec>(&self, key: &Key) -> Result<Option<T>> {
        if key.kind() != T::KIND {
            return Err(Error::KindMismatch {
                expected: T::KIND,
                actual: key.kind().to_string(),
            });
        }
        self.get_by_id::<T>(key.id().clone())
    }

    /// Fetches the entity a reference points at (the lazy-fetch capability
    /// of references).
    ///
    /// # Errors
    ///
    /// Fails with [`Error::KindMismatch`] when the reference's kind is not
    /// `T::KIND`.
    pub fn get_by_ref<T: EntityCodec>(&self, reference: &DocRef) -> Result<Option<T>> {
        self.get_by_key::<T>(&Key::from_ref(reference))
    }

    /// Counts all documents in `T`'s collection.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn count_kind<T: EntityCodec>(&self) -> Result<u64> {
        Ok(self.store.count(T::KIND, &Document::new())?)
    }

    /// Counts documents matching a query's filter.
    ///
    /// # Errors
    ///
    /// Fails on store errors.
    pub fn count<T: EntityCodec>(&self, query: &Query<T>) -> Result<u64> {
        Ok(self.store.count(T::KIND, query.filter_document())?)
    }
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("write_concern", &self.config.write_concern)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Datastore;
    use crate::codec::{EntityCodec, InvolvedObjects};
    use crate::error::{CodecError, CodecResult};
    use docmap_document::{Document, Value, ID_FIELD};
    use docmap_store::{DocumentStore, InMemoryStore};
    use std::sync::{Arc, Mutex};

    /// Unversioned entity with a client-assignable identity.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Person {
        pub id: Option<Value>,
        pub name: String,
        pub age: i64,
    }

    impl Person {
        pub fn new(name: &str, age: i64) -> Self {
            Self {
                id: None,
                name: name.to_string(),
                age,
            }
        }

        pub fn with_id(id: impl Into<Value>, name: &str, age: i64) -> Self {
            Self {
                id: Some(id.into()),
                name: name.to_string(),
                age,
            }
        }
    }

    impl EntityCodec for Person {
        const KIND: &'static str = "people";

        fn encode(&self) -> CodecResult<(Document, InvolvedObjects)> {
            let mut document = Document::new();
            if let Some(id) = &self.id {
                document.insert(ID_FIELD, id.clone());
            }
            document.insert("name", self.name.as_str());
            document.insert("age", self.age);
            Ok((document, InvolvedObjects::new()))
        }

        fn decode(document: &Document) -> CodecResult<Self> {
            let name = document
                .get("name")
                .and_then(Value::as_text)
                .ok_or_else(|| CodecError::missing_field("name"))?
                .to_string();
            let age = document
                .get("age")
                .and_then(Value::as_integer)
                .ok_or_else(|| CodecError::missing_field("age"))?;
            Ok(Self {
                id: document.get(ID_FIELD).cloned(),
                name,
                age,
            })
        }

        fn id(&self) -> Option<Value> {
            self.id.clone()
        }

        fn set_id(&mut self, id: Value) {
            self.id = Some(id);
        }
    }

    /// Versioned entity: saves go through the optimistic protocol.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Note {
        pub id: Option<Value>,
        pub body: String,
        pub version: Option<u64>,
    }

    impl Note {
        pub fn new(body: &str) -> Self {
            Self {
                id: None,
                body: body.to_string(),
                version: None,
            }
        }
    }

    impl EntityCodec for Note {
        const KIND: &'static str = "notes";
        const VERSION_FIELD: Option<&'static str> = Some("version");

        fn encode(&self) -> CodecResult<(Document, InvolvedObjects)> {
            let mut document = Document::new();
            if let Some(id) = &self.id {
                document.insert(ID_FIELD, id.clone());
            }
            document.insert("body", self.body.as_str());
            Ok((document, InvolvedObjects::new()))
        }

        fn decode(document: &Document) -> CodecResult<Self> {
            let body = document
                .get("body")
                .and_then(Value::as_text)
                .ok_or_else(|| CodecError::missing_field("body"))?
                .to_string();
            let version = document
                .get("version")
                .and_then(Value::as_integer)
                .map(|version| version as u64);
            Ok(Self {
                id: document.get(ID_FIELD).cloned(),
                body,
                version,
            })
        }

        fn id(&self) -> Option<Value> {
            self.id.clone()
        }

        fn set_id(&mut self, id: Value) {
            self.id = Some(id);
        }

        fn version(&self) -> Option<u64> {
            self.version
        }

        fn set_version(&mut self, version: u64) {
            self.version = Some(version);
        }
    }

    /// Second kind for heterogeneous resolution tests.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Gadget {
        pub id: Option<Value>,
        pub label: String,
    }

    impl Gadget {
        pub fn with_id(id: impl Into<Value>, label: &str) -> Self {
            Self {
                id: Some(id.into()),
                label: label.to_string(),
            }
        }
    }

    impl EntityCodec for Gadget {
        const KIND: &'static str = "gadgets";

        fn encode(&self) -> CodecResult<(Document, InvolvedObjects)> {
            let mut document = Document::new();
            if let Some(id) = &self.id {
                document.insert(ID_FIELD, id.clone());
            }
            document.insert("label", self.label.as_str());
            Ok((document, InvolvedObjects::new()))
        }

        fn decode(document: &Document) -> CodecResult<Self> {
            let label = document
                .get("label")
                .and_then(Value::as_text)
                .ok_or_else(|| CodecError::missing_field("label"))?
                .to_string();
            Ok(Self {
                id: document.get(ID_FIELD).cloned(),
                label,
            })
        }

        fn id(&self) -> Option<Value> {
            self.id.clone()
        }

        fn set_id(&mut self, id: Value) {
            self.id = Some(id);
        }
    }

    /// Root entity with nested items, recording lifecycle notifications.
    #[derive(Debug, Clone)]
    pub struct Order {
        pub id: Option<Value>,
        pub items: Vec<String>,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    impl Order {
        pub fn new(id: impl Into<Value>, items: &[&str]) -> Self {
            Self {
                id: Some(id.into()),
                items: items.iter().map(|item| item.to_string()).collect(),
                log: Arc::default(),
            }
        }

        pub fn log_entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl EntityCodec for Order {
        const KIND: &'static str = "orders";

        fn encode(&self) -> CodecResult<(Document, InvolvedObjects)> {
            let mut document = Document::new();
            if let Some(id) = &self.id {
                document.insert(ID_FIELD, id.clone());
            }
            document.insert(
                "items",
                Value::Array(self.items.iter().map(|item| item.as_str().into()).collect()),
            );

            let mut involved = InvolvedObjects::new();
            for item in &self.items {
                let mut item_document = Document::new();
                item_document.insert("item", item.as_str());
                let log = Arc::clone(&self.log);
                let entry = format!("item:{item}");
                involved.push(
                    Box::new(move |_| log.lock().unwrap().push(entry.clone())),
                    item_document,
                );
            }
            Ok((document, involved))
        }

        fn decode(document: &Document) -> CodecResult<Self> {
            let items = document
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| CodecError::missing_field("items"))?
                .iter()
                .filter_map(|item| item.as_text().map(str::to_string))
                .collect();
            Ok(Self {
                id: document.get(ID_FIELD).cloned(),
                items,
                log: Arc::default(),
            })
        }

        fn id(&self) -> Option<Value> {
            self.id.clone()
        }

        fn set_id(&mut self, id: Value) {
            self.id = Some(id);
        }

        fn post_persist(&mut self, _document: &Document) {
            self.log.lock().unwrap().push("root".to_string());
        }
    }

    pub fn datastore() -> (Datastore, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let datastore = Datastore::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
        (datastore, store)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{datastore, Gadget, Person};
    use super::*;

    #[test]
    fn key_of_requires_identity() {
        let (datastore, _) = datastore();

        let unsaved = Person::new("Alice", 30);
        assert!(matches!(
            datastore.key_of(&unsaved),
            Err(Error::IdentityMissing { .. })
        ));

        let saved = Person::with_id(7i64, "Alice", 30);
        let key = datastore.key_of(&saved).unwrap();
        assert_eq!(key.kind(), "people");
        assert_eq!(key.id(), &Value::Integer(7));
    }

    #[test]
    fn create_ref_round_trip() {
        let (datastore, _) = datastore();
        let person = Person::with_id(3i64, "Bo", 40);

        let reference = datastore.create_ref_for(&person).unwrap();
        assert_eq!(reference.kind(), "people");

        let direct = datastore.create_ref::<Person>(3i64);
        assert_eq!(reference, direct);
    }

    #[test]
    fn get_by_id_and_back() {
        let (datastore, _) = datastore();
        let mut person = Person::new("Alice", 30);
        datastore.insert(&mut person).unwrap();

        let found: Person = datastore
            .get_by_id(person.id.clone().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(found, person);

        let reread = datastore.get(&person).unwrap().unwrap();
        assert_eq!(reread, person);
    }

    #[test]
    fn get_by_key_checks_kind() {
        let (datastore, _) = datastore();
        let mut person = Person::new("Alice", 30);
        datastore.insert(&mut person).unwrap();

        let key = datastore.key_of(&person).unwrap();
        assert!(datastore.get_by_key::<Person>(&key).unwrap().is_some());

        let result = datastore.get_by_key::<Gadget>(&key);
        assert!(matches!(result, Err(Error::KindMismatch { .. })));
    }

    #[test]
    fn get_by_ref_fetches() {
        let (datastore, _) = datastore();
        let mut person = Person::new("Alice", 30);
        datastore.insert(&mut person).unwrap();

        let reference = datastore.create_ref_for(&person).unwrap();
        let fetched: Person = datastore.get_by_ref(&reference).unwrap().unwrap();
        assert_eq!(fetched, person);
    }

    #[test]
    fn find_with_filter_and_sort() {
        let (datastore, _) = datastore();
        for (name, age) in [("a", 30i64), ("b", 10), ("c", 20)] {
            datastore.insert(&mut Person::new(name, age)).unwrap();
        }

        let query = Query::<Person>::new().sort_asc("age");
        let people = datastore.find(&query).unwrap();
        let ages: Vec<i64> = people.iter().map(|person| person.age).collect();
        assert_eq!(ages, vec![10, 20, 30]);

        let adults = datastore
            .find(&Query::<Person>::new().filter_field("age", 30i64))
            .unwrap();
        assert_eq!(adults.len(), 1);
    }

    #[test]
    fn count_operations() {
        let (datastore, _) = datastore();
        for age in [10i64, 20, 30] {
            datastore.insert(&mut Person::new("p", age)).unwrap();
        }

        assert_eq!(datastore.count_kind::<Person>().unwrap(), 3);
        let query = Query::<Person>::new().filter_field("age", 20i64);
        assert_eq!(datastore.count(&query).unwrap(), 1);
    }

    #[test]
    fn missing_document_reads_as_none() {
        let (datastore, _) = datastore();
        assert!(datastore.get_by_id::<Person>(99i64).unwrap().is_none());
    }
}
