//! # docmap persistence core
//!
//! The persistence protocol of an object-document mapper, written against
//! an abstract document store.
//!
//! The core sits between typed entities and an opaque store. Entities cross
//! into it through the [`EntityCodec`] boundary, reads and writes leave it
//! through the [`DocumentStore`](docmap_store::DocumentStore) boundary, and
//! everything in between is the protocol itself:
//!
//! - [`Key`] and [`DocRef`] — the identity model for persisted entities
//! - [`Datastore`] — insert and save semantics, including the post-write
//!   identity check, acknowledgement handling, and post-write side effects
//! - optimistic versioning — conditional saves for versioned types, failing
//!   with [`Error::ConcurrentModification`] when a stale copy is written
//! - update and delete dispatch with fail-fast validation
//! - batch key resolution, one store call per kind
//! - atomic find-and-mutate through the store's command entry point
//!
//! The datastore holds no global state and registers nothing anywhere;
//! construct one over any [`DocumentStore`](docmap_store::DocumentStore)
//! handle and pass it where it is needed.
//!
//! # Example
//!
//! ```rust,ignore
//! use docmap_core::{Datastore, Query};
//! use docmap_store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let datastore = Datastore::new(Arc::new(InMemoryStore::new()));
//!
//! let mut task = Task { id: None, title: "write docs".into(), version: None };
//! datastore.save(&mut task)?;          // stamps version 1
//!
//! let mut stale = task.clone();
//! datastore.save(&mut task)?;          // version 2
//! assert!(datastore.save(&mut stale).is_err());  // lost the race
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod datastore;
mod error;
mod key;
mod query;

pub use codec::{EntityCodec, EntityType, InvolvedObjects, PostPersistFn};
pub use config::Config;
pub use datastore::{Datastore, DeleteTarget};
pub use error::{CodecError, CodecResult, Error, Result};
pub use key::{keys_as_refs, refs_to_keys, DocRef, Key};
pub use query::{Query, UpdateOps};
