mod routing;
mod transaction;

use bson::{doc, spec::BinarySubtype, Binary, Document};
use uuid::Uuid;

use crate::{
    error::{ErrorKind, Result},
    operation::{AbortTransaction, CommitTransaction},
    options::{ServerAddress, SessionOptions, TransactionOptions},
    trace::SESSION_TRACING_EVENT_TARGET,
    Client,
};

pub(crate) use routing::OperationRequest;
pub(crate) use transaction::Transaction;
pub use transaction::TransactionState;

/// A logical session used to group operations and run transactions.
///
/// `ClientSession`s are created with [`Client::start_session`] and must only be used with the
/// client that created them. A session is used by one task at a time; the transaction state and
/// the router it is pinned to live here and nowhere else.
///
/// When a session is sent to a sharded cluster inside a transaction, every operation of that
/// transaction is routed to the router that served its first operation, including the final
/// `commitTransaction` or `abortTransaction`.
///
/// ```rust
/// # use shard_session::{Client, error::Result};
/// # async fn do_stuff(client: Client) -> Result<()> {
/// let mut session = client.start_session(None);
/// session.start_transaction(None)?;
/// client
///     .database("db")
///     .collection::<bson::Document>("coll")
///     .insert_one_with_session(bson::doc! { "x": 1 }, &mut session)
///     .await?;
/// session.commit_transaction().await?;
/// # Ok(())
/// # }
/// ```
///
/// Dropping a session with an in-progress transaction aborts the transaction in the background
/// when a tokio runtime is available. Call [`ClientSession::end`] to do this explicitly.
#[derive(Debug)]
pub struct ClientSession {
    id: Document,
    uuid: Uuid,
    client: Client,
    options: Option<SessionOptions>,
    txn_number: i64,
    ended: bool,
    pub(crate) transaction: Transaction,
}

impl ClientSession {
    pub(crate) fn new(client: Client, options: Option<SessionOptions>) -> Self {
        let uuid = Uuid::new_v4();
        let id = doc! {
            "id": Binary { subtype: BinarySubtype::Uuid, bytes: uuid.as_bytes().to_vec() },
        };

        Self {
            id,
            uuid,
            client,
            options,
            txn_number: 0,
            ended: false,
            transaction: Default::default(),
        }
    }

    /// The client used to create this session.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// The id of this session, as sent in the `lsid` field of commands.
    pub fn id(&self) -> &Document {
        &self.id
    }

    pub(crate) fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// The options used to create this session.
    pub fn options(&self) -> Option<&SessionOptions> {
        self.options.as_ref()
    }

    /// The number of the most recently started transaction.
    pub fn txn_number(&self) -> i64 {
        self.txn_number
    }

    /// The phase of this session's transaction.
    pub fn transaction_state(&self) -> TransactionState {
        self.transaction.state
    }

    /// The router this session's transaction is pinned to, if any.
    pub fn pinned_router(&self) -> Option<&ServerAddress> {
        self.transaction.pinned()
    }

    /// Whether [`ClientSession::end`] has been called.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn check_not_ended(&self) -> Result<()> {
        if self.ended {
            return Err(ErrorKind::SessionEnded.into());
        }
        Ok(())
    }

    fn default_transaction_options(&self) -> Option<&TransactionOptions> {
        self.options
            .as_ref()
            .and_then(|options| options.default_transaction_options.as_ref())
    }

    /// Starts a new transaction on this session. Options that are not set fall back to the
    /// session's default transaction options.
    ///
    /// Nothing is sent to the server until the first operation of the transaction runs; that
    /// operation decides which router the transaction is pinned to.
    ///
    /// Errors with [`ErrorKind::TransactionInProgress`] if a transaction is already active.
    pub fn start_transaction(
        &mut self,
        options: impl Into<Option<TransactionOptions>>,
    ) -> Result<()> {
        self.check_not_ended()?;

        let options = options
            .into()
            .unwrap_or_default()
            .merge(self.default_transaction_options());
        self.transaction.start(options)?;
        self.txn_number += 1;

        tracing::debug!(
            target: SESSION_TRACING_EVENT_TARGET,
            sessionId = self.uuid.to_string(),
            txnNumber = self.txn_number,
            "Transaction started"
        );
        Ok(())
    }

    /// Commits the active transaction.
    ///
    /// The `commitTransaction` command goes to the router the transaction is pinned to. If it
    /// fails, the transaction stays in [`TransactionState::Committing`] with its pin, so calling
    /// this again retries the commit against the same router.
    pub async fn commit_transaction(&mut self) -> Result<()> {
        self.check_not_ended()?;

        if !self.transaction.begin_commit()? {
            return Ok(());
        }

        let max_commit_time = self
            .transaction
            .options
            .as_ref()
            .and_then(|options| options.max_commit_time);
        let client = self.client.clone();
        client
            .execute_operation(CommitTransaction::new(max_commit_time), &mut *self)
            .await?;
        self.transaction.reset();

        tracing::debug!(
            target: SESSION_TRACING_EVENT_TARGET,
            sessionId = self.uuid.to_string(),
            txnNumber = self.txn_number,
            "Transaction committed"
        );
        Ok(())
    }

    /// Aborts the active transaction.
    ///
    /// The transaction is finished locally whether or not the `abortTransaction` command
    /// succeeds; its error, if any, is still returned.
    pub async fn abort_transaction(&mut self) -> Result<()> {
        self.check_not_ended()?;

        if !self.transaction.begin_abort()? {
            return Ok(());
        }

        let client = self.client.clone();
        let result = client
            .execute_operation(AbortTransaction, &mut *self)
            .await
            .map(|_| ());
        self.transaction.reset();

        tracing::debug!(
            target: SESSION_TRACING_EVENT_TARGET,
            sessionId = self.uuid.to_string(),
            txnNumber = self.txn_number,
            "Transaction aborted"
        );
        result
    }

    /// Ends this session, aborting its transaction if one is active. Any further use of the
    /// session fails with [`ErrorKind::SessionEnded`].
    pub async fn end(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }

        let result = match self.transaction.state {
            TransactionState::None => Ok(()),
            TransactionState::Committing => {
                self.transaction.reset();
                Ok(())
            }
            TransactionState::Starting
            | TransactionState::InProgress
            | TransactionState::Aborting => self.abort_transaction().await,
        };
        self.ended = true;
        result
    }
}

/// What a dropped session hands to the background abort. It has no `Drop` of its own, so a
/// background task that never runs releases it without spawning again.
struct DroppedClientSession {
    id: Document,
    uuid: Uuid,
    client: Client,
    options: Option<SessionOptions>,
    txn_number: i64,
    transaction: Transaction,
}

impl From<DroppedClientSession> for ClientSession {
    fn from(dropped_session: DroppedClientSession) -> Self {
        Self {
            id: dropped_session.id,
            uuid: dropped_session.uuid,
            client: dropped_session.client,
            options: dropped_session.options,
            txn_number: dropped_session.txn_number,
            ended: false,
            transaction: dropped_session.transaction,
        }
    }
}

impl ClientSession {
    /// Moves an in-progress transaction out of this session and aborts it on `handle`.
    pub(crate) fn abort_in_background(&mut self, handle: &tokio::runtime::Handle) {
        if self.ended || self.transaction.state != TransactionState::InProgress {
            return;
        }

        let dropped_session = DroppedClientSession {
            id: self.id.clone(),
            uuid: self.uuid,
            client: self.client.clone(),
            options: self.options.take(),
            txn_number: self.txn_number,
            transaction: std::mem::take(&mut self.transaction),
        };
        handle.spawn(async move {
            let mut session: ClientSession = dropped_session.into();
            let _ = session.abort_transaction().await;
        });
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            self.abort_in_background(&handle);
        }
    }
}
