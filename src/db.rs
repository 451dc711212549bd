use std::{fmt, sync::Arc};

use crate::{
    bson::Document,
    error::Result,
    operation::RunCommand,
    selection_criteria::SelectionCriteria,
    Client,
    ClientSession,
    Collection,
};

/// `Database` is the client-side abstraction of a database. It can be used to get handles to
/// [`Collection`]s and to run arbitrary commands.
///
/// `Database` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html) internally,
/// so it can safely be shared across threads or async tasks.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    client: Client,
    name: String,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Database {
    pub(crate) fn new(client: Client, name: &str) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                client,
                name: name.to_string(),
            }),
        }
    }

    /// Get the `Client` that this database descended from.
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Gets the name of the `Database`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Gets a handle to a collection in this database with the provided name. The
    /// [`Collection`] is generic over `T`, the type of the documents stored in it.
    ///
    /// This method does not send or receive anything across the wire to the database, so it can
    /// be used repeatedly without incurring any costs from I/O.
    pub fn collection<T>(&self, name: &str) -> Collection<T> {
        Collection::new(self, name)
    }

    /// Runs a database-level command.
    ///
    /// The command is named by its first key. Commands that have nothing to do with a
    /// transaction, such as `ping` or `hello`, are routed with normal server selection even when
    /// a session is given, which releases the session's router pin.
    pub async fn run_command(
        &self,
        command: Document,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
    ) -> Result<Document> {
        let op = RunCommand::new(self.name().to_string(), command, selection_criteria.into())?;
        self.client().execute_operation(op, None).await
    }

    /// Runs a database-level command using the provided `ClientSession`.
    pub async fn run_command_with_session(
        &self,
        command: Document,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
        session: &mut ClientSession,
    ) -> Result<Document> {
        let op = RunCommand::new(self.name().to_string(), command, selection_criteria.into())?;
        self.client().execute_operation(op, session).await
    }
}
