//! # docmap document model
//!
//! Dynamic document values for docmap.
//!
//! A [`Document`] is an ordered, string-keyed map of [`Value`]s — the
//! representation every docmap crate exchanges with the store boundary.
//! Field order is preserved exactly as inserted, since the persistence
//! layer relies on encounter order when replaying nested-entity side
//! effects.
//!
//! ## Usage
//!
//! ```
//! use docmap_document::{Document, Value, ID_FIELD};
//!
//! let mut doc = Document::new();
//! doc.insert(ID_FIELD, 7i64);
//! doc.insert("name", "Alice");
//!
//! assert_eq!(doc.get("name"), Some(&Value::Text("Alice".into())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod value;

pub use document::Document;
pub use value::Value;

/// The reserved field name that carries a document's identity.
pub const ID_FIELD: &str = "_id";
