use crate::{
    error::{Error, ErrorKind, Result},
    event::command::CommandKind,
    options::{ServerAddress, TransactionOptions},
    sdam::ServerType,
    selection_criteria::ReadPreference,
    trace::SESSION_TRACING_EVENT_TARGET,
};

/// The phase of a session's transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionState {
    /// No transaction is active.
    #[default]
    None,

    /// A transaction was started but no operation has run in it yet.
    Starting,

    /// At least one operation has run in the transaction.
    InProgress,

    /// A `commitTransaction` was sent and has not succeeded yet.
    Committing,

    /// An `abortTransaction` was sent and has not completed yet.
    Aborting,
}

/// A session's transaction and the router it is pinned to.
///
/// A pin only exists while a transaction is active: every transition back to
/// [`TransactionState::None`] goes through [`Transaction::reset`], which drops it.
#[derive(Debug, Default)]
pub(crate) struct Transaction {
    pub(crate) state: TransactionState,
    pub(crate) options: Option<TransactionOptions>,
    pinned: Option<ServerAddress>,
}

impl Transaction {
    pub(crate) fn start(&mut self, options: TransactionOptions) -> Result<()> {
        if self.is_active() {
            return Err(ErrorKind::TransactionInProgress.into());
        }

        if options
            .selection_criteria
            .as_ref()
            .and_then(|criteria| criteria.as_read_pref())
            .is_some_and(|read_pref| read_pref != &ReadPreference::Primary)
        {
            return Err(Error::invalid_argument(
                "read preference in a transaction must be primary",
            ));
        }

        self.state = TransactionState::Starting;
        self.options = Some(options);
        self.pinned = None;
        Ok(())
    }

    /// Whether a transaction has been started and not yet finished.
    pub(crate) fn is_active(&self) -> bool {
        self.state != TransactionState::None
    }

    pub(crate) fn pinned(&self) -> Option<&ServerAddress> {
        self.pinned.as_ref()
    }

    /// Records where a transactional operation without a pin was routed. Routers are pinned so
    /// that the rest of the transaction reaches the same one; the first operation of the
    /// transaction also moves it to [`TransactionState::InProgress`].
    pub(crate) fn record_route(&mut self, address: &ServerAddress, server_type: Option<ServerType>) {
        if server_type == Some(ServerType::Mongos) {
            tracing::trace!(
                target: SESSION_TRACING_EVENT_TARGET,
                serverHost = address.host(),
                serverPort = address.port_tracing_representation(),
                "Session pinned to router"
            );
            self.pinned = Some(address.clone());
        }

        if self.state == TransactionState::Starting {
            self.state = TransactionState::InProgress;
        }
    }

    pub(crate) fn unpin(&mut self) {
        if let Some(address) = self.pinned.take() {
            tracing::trace!(
                target: SESSION_TRACING_EVENT_TARGET,
                serverHost = address.host(),
                serverPort = address.port_tracing_representation(),
                "Session unpinned"
            );
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = TransactionState::None;
        self.options = None;
        self.unpin();
    }

    /// Rejects operations that cannot run in the current phase. While a commit or abort is
    /// outstanding, only a retry of that same command is allowed.
    pub(crate) fn check_operation(&self, kind: CommandKind, name: &str) -> Result<()> {
        match (self.state, kind) {
            (TransactionState::Committing, CommandKind::CommitTransaction)
            | (TransactionState::Aborting, CommandKind::AbortTransaction) => Ok(()),
            (TransactionState::Committing, _) => Err(Error::state_conflict(format!(
                "Cannot run {} while the transaction is being committed",
                name
            ))),
            (TransactionState::Aborting, _) => Err(Error::state_conflict(format!(
                "Cannot run {} while the transaction is being aborted",
                name
            ))),
            _ => Ok(()),
        }
    }

    /// Moves the transaction towards commit. Returns whether a `commitTransaction` command has
    /// to be sent; a transaction in which nothing ran finishes immediately.
    pub(crate) fn begin_commit(&mut self) -> Result<bool> {
        match self.state {
            TransactionState::None => Err(Error::transaction("No transaction started")),
            TransactionState::Starting => {
                self.reset();
                Ok(false)
            }
            TransactionState::InProgress | TransactionState::Committing => {
                self.state = TransactionState::Committing;
                Ok(true)
            }
            TransactionState::Aborting => Err(Error::state_conflict(
                "Cannot call commitTransaction while the transaction is being aborted",
            )),
        }
    }

    /// Moves the transaction towards abort. Returns whether an `abortTransaction` command has
    /// to be sent; a transaction in which nothing ran finishes immediately.
    pub(crate) fn begin_abort(&mut self) -> Result<bool> {
        match self.state {
            TransactionState::None => Err(Error::transaction("No transaction started")),
            TransactionState::Starting => {
                self.reset();
                Ok(false)
            }
            TransactionState::InProgress | TransactionState::Aborting => {
                self.state = TransactionState::Aborting;
                Ok(true)
            }
            TransactionState::Committing => Err(Error::state_conflict(
                "Cannot call abortTransaction while the transaction is being committed",
            )),
        }
    }
}
