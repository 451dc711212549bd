pub mod session;

use super::{ClientSession, Database};
use crate::{
    command::CommandExecutor,
    error::Result,
    options::{ClientOptions, SelectionCriteria, SessionOptions},
    sdam::TopologyWatcher,
    Client as AsyncClient,
};

/// This is the main entry point for the synchronous API.
///
/// `Client` is a wrapper around the asynchronous [`Client`](crate::Client), and it starts up a
/// tokio runtime internally to run that wrapped client on.
///
/// `Client` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html) internally,
/// so it can safely be shared across threads.
#[derive(Clone, Debug)]
pub struct Client {
    pub(crate) async_client: AsyncClient,
}

impl From<AsyncClient> for Client {
    fn from(async_client: AsyncClient) -> Self {
        Self { async_client }
    }
}

impl Client {
    /// Creates a new `Client` with the given options. See
    /// [`Client::with_options`](crate::Client::with_options).
    pub fn with_options(
        options: ClientOptions,
        topology: TopologyWatcher,
        executor: impl CommandExecutor,
    ) -> Self {
        AsyncClient::with_options(options, topology, executor).into()
    }

    /// Creates a new `Client` configured by the connection string `uri`.
    pub fn with_uri_str(
        uri: impl AsRef<str>,
        topology: TopologyWatcher,
        executor: impl CommandExecutor,
    ) -> Result<Self> {
        AsyncClient::with_uri_str(uri, topology, executor).map(Into::into)
    }

    /// Gets the default selection criteria the `Client` uses for operations.
    pub fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.async_client.selection_criteria()
    }

    /// Gets a handle to a database specified by `name`.
    pub fn database(&self, name: &str) -> Database {
        Database::new(self.async_client.database(name))
    }

    /// Starts a new [`ClientSession`].
    pub fn start_session(&self, options: impl Into<Option<SessionOptions>>) -> ClientSession {
        self.async_client.start_session(options).into()
    }
}
