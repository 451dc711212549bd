use super::{ClientSession, Collection};
use crate::{
    bson::Document,
    error::Result,
    options::SelectionCriteria,
    sync::block_on,
    Database as AsyncDatabase,
};

/// `Database` is the client-side abstraction of a database. It wraps an async
/// [`Database`](crate::Database) and runs its operations on the sync API's runtime.
#[derive(Clone, Debug)]
pub struct Database {
    async_database: AsyncDatabase,
}

impl Database {
    pub(crate) fn new(async_database: AsyncDatabase) -> Self {
        Self { async_database }
    }

    /// Gets the name of the `Database`.
    pub fn name(&self) -> &str {
        self.async_database.name()
    }

    /// Gets a handle to a collection in this database with the provided name.
    pub fn collection<T>(&self, name: &str) -> Collection<T> {
        Collection::new(self.async_database.collection(name))
    }

    /// Runs a database-level command.
    pub fn run_command(
        &self,
        command: Document,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
    ) -> Result<Document> {
        block_on(self.async_database.run_command(command, selection_criteria))
    }

    /// Runs a database-level command using the provided `ClientSession`.
    pub fn run_command_with_session(
        &self,
        command: Document,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
        session: &mut ClientSession,
    ) -> Result<Document> {
        block_on(self.async_database.run_command_with_session(
            command,
            selection_criteria,
            &mut session.async_client_session,
        ))
    }
}
