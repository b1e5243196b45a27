//! Document store trait definition.

use crate::error::StoreResult;
use crate::outcome::WriteOutcome;
use docmap_document::Document;

/// An abstract document store.
///
/// Implementations are **opaque document stores**: they accept filter and
/// body documents and report write outcomes, but interpret nothing about
/// entities, keys, or versions. The persistence core owns all of that and
/// only relies on the contracts below.
///
/// # Invariants
///
/// - `insert` backfills the document's identity field when the incoming
///   document does not carry one
/// - `update` with an empty filter targets every document in the collection
/// - `last_write_error` reflects the most recent write on this handle
/// - Implementations must be `Send + Sync`; the core shares one handle
///   across all callers without additional locking
///
/// # Implementors
///
/// - [`super::InMemoryStore`] — for testing
pub trait DocumentStore: Send + Sync {
    /// Inserts a document into a collection.
    ///
    /// When `document` lacks an identity field the store assigns one and
    /// writes it back into `document` before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable. Per-write failures
    /// (such as duplicate identities) are reported through the outcome,
    /// not as a transport error.
    fn insert(&self, collection: &str, document: &mut Document) -> StoreResult<WriteOutcome>;

    /// Updates documents matching `filter`.
    ///
    /// A `body` whose top-level fields all start with `$` is an operator
    /// update; any other body replaces the matched document wholesale while
    /// preserving its identity field. `upsert` inserts when nothing matched;
    /// `multi` applies the update to every match instead of the first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn update(
        &self,
        collection: &str,
        filter: &Document,
        body: &Document,
        upsert: bool,
        multi: bool,
    ) -> StoreResult<WriteOutcome>;

    /// Removes all documents matching `filter`.
    ///
    /// An empty filter removes every document in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn remove(&self, collection: &str, filter: &Document) -> StoreResult<WriteOutcome>;

    /// Finds documents matching `filter`.
    ///
    /// `sort` maps field names to direction (`1` ascending, `-1`
    /// descending) and is applied before `offset` and `limit`; a `limit`
    /// of zero means unbounded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        sort: &Document,
        offset: u64,
        limit: u64,
    ) -> StoreResult<Vec<Document>>;

    /// Runs a raw command against the store.
    ///
    /// This is the entry point for server-side atomic operations such as
    /// find-and-modify.
    ///
    /// # Errors
    ///
    /// Returns an error if the command document is malformed or the store
    /// is unreachable.
    fn run_command(&self, command: &Document) -> StoreResult<Document>;

    /// Reads the error signal of the most recent write, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn last_write_error(&self) -> StoreResult<Option<String>>;

    /// Counts documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable.
    fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64>;
}
