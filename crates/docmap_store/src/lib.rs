//! # docmap store boundary
//!
//! The store-access boundary consumed by the docmap persistence core.
//!
//! This crate defines:
//! - [`DocumentStore`] — the abstract capability the persistence protocol
//!   issues its reads and writes through
//! - [`WriteOutcome`] and [`WriteConcern`] — write acknowledgement types
//! - [`InMemoryStore`] — an in-process implementation for tests
//!
//! The boundary is deliberately narrow: insert, update, remove, find, one
//! generic command entry point, and a way to read the outcome of the last
//! write. Connection management, authentication, and the wire protocol all
//! live behind implementations of [`DocumentStore`], never in front of it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod outcome;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use outcome::{WriteConcern, WriteOutcome};
pub use store::DocumentStore;
