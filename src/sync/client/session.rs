use super::Client;
use crate::{
    bson::Document,
    error::Result,
    options::{ServerAddress, TransactionOptions},
    sync::{block_on, TOKIO_RUNTIME},
    ClientSession as AsyncClientSession,
    TransactionState,
};

/// A logical session used to group operations and run transactions. To create a
/// `ClientSession`, call `start_session` on a [`Client`].
///
/// `ClientSession` instances are not thread safe. They can only be used by one thread at a time.
#[derive(Debug)]
pub struct ClientSession {
    pub(crate) async_client_session: AsyncClientSession,
}

impl From<AsyncClientSession> for ClientSession {
    fn from(async_client_session: AsyncClientSession) -> Self {
        Self {
            async_client_session,
        }
    }
}

impl<'a> From<&'a mut ClientSession> for &'a mut AsyncClientSession {
    fn from(value: &'a mut ClientSession) -> &'a mut AsyncClientSession {
        &mut value.async_client_session
    }
}

impl ClientSession {
    /// The client used to create this session.
    pub fn client(&self) -> Client {
        self.async_client_session.client().into()
    }

    /// The id of this session.
    pub fn id(&self) -> &Document {
        self.async_client_session.id()
    }

    /// The phase of this session's transaction.
    pub fn transaction_state(&self) -> TransactionState {
        self.async_client_session.transaction_state()
    }

    /// The router this session's transaction is pinned to, if any.
    pub fn pinned_router(&self) -> Option<&ServerAddress> {
        self.async_client_session.pinned_router()
    }

    /// Starts a new transaction on this session. See
    /// [`ClientSession::start_transaction`](crate::ClientSession::start_transaction).
    pub fn start_transaction(
        &mut self,
        options: impl Into<Option<TransactionOptions>>,
    ) -> Result<()> {
        self.async_client_session.start_transaction(options)
    }

    /// Commits the transaction that is currently active on this session.
    pub fn commit_transaction(&mut self) -> Result<()> {
        block_on(self.async_client_session.commit_transaction())
    }

    /// Aborts the transaction that is currently active on this session.
    pub fn abort_transaction(&mut self) -> Result<()> {
        block_on(self.async_client_session.abort_transaction())
    }

    /// Ends this session, aborting its transaction if one is active.
    pub fn end(&mut self) -> Result<()> {
        block_on(self.async_client_session.end())
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        // blocking callers have no current runtime, so the abort goes to the one behind the
        // sync API
        self.async_client_session
            .abort_in_background(TOKIO_RUNTIME.handle());
    }
}
