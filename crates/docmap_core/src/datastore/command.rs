//! Atomic find-and-mutate, built on the store's command entry point.

use super::Datastore;
use crate::codec::EntityCodec;
use crate::error::Result;
use crate::query::Query;
use docmap_document::{Document, Value};
use tracing::trace;

impl Datastore {
    /// Atomically finds one matching document, removes it, and returns the
    /// removed entity. `None` when nothing matched.
    ///
    /// The find and the removal happen as one store-side step, so no other
    /// caller can observe or claim the document in between. The query's
    /// sort picks which match is taken when several qualify.
    ///
    /// # Errors
    ///
    /// Fails on store or codec errors.
    pub fn find_and_delete<T: EntityCodec>(&self, query: &Query<T>) -> Result<Option<T>> {
        let mut command = find_and_modify_command(query);
        command.insert("remove", true);
        self.run_value_command(&command)
    }

    /// Atomically finds one matching document, applies an update body to
    /// it, and returns the entity. `None` when nothing matched.
    ///
    /// With `return_previous` the entity reflects the state before the
    /// update; otherwise it reflects the state after.
    ///
    /// # Errors
    ///
    /// Fails on store or codec errors.
    pub fn find_and_modify<T: EntityCodec>(
        &self,
        query: &Query<T>,
        body: &Document,
        return_previous: bool,
    ) -> Result<Option<T>> {
        let mut command = find_and_modify_command(query);
        command.insert("update", body.clone());
        if !return_previous {
            command.insert("new", true);
        }
        self.run_value_command(&command)
    }

    /// Issues a find-and-mutate command and decodes its `value` reply
    /// field. A missing or null `value` means nothing matched.
    fn run_value_command<T: EntityCodec>(&self, command: &Document) -> Result<Option<T>> {
        trace!(collection = T::KIND, "findandmodify");
        let reply = self.store().run_command(command)?;
        match reply.get("value") {
            Some(Value::Document(document)) => Ok(Some(T::decode(document)?)),
            _ => Ok(None),
        }
    }
}

/// Builds the common head of a find-and-mutate command document.
fn find_and_modify_command<T: EntityCodec>(query: &Query<T>) -> Document {
    let mut command = Document::new();
    command.insert("findandmodify", T::KIND);
    if !query.filter_document().is_empty() {
        command.insert("query", query.filter_document().clone());
    }
    if !query.sort_document().is_empty() {
        command.insert("sort", query.sort_document().clone());
    }
    command
}
