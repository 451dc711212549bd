mod abort_transaction;
mod commit_transaction;
mod count;
mod delete;
mod find;
mod get_more;
mod insert;
mod run_command;


use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    bson::{self, Document},
    command::Command,
    error::{CommandError, ErrorKind, Result},
    event::command::CommandKind,
    selection_criteria::SelectionCriteria,
};

pub(crate) use abort_transaction::AbortTransaction;
pub(crate) use commit_transaction::CommitTransaction;
pub(crate) use count::Count;
pub(crate) use delete::Delete;
pub(crate) use find::Find;
pub(crate) use get_more::GetMore;
pub(crate) use insert::Insert;
pub(crate) use run_command::RunCommand;

/// Commands that servers refuse to run inside a transaction. They are dispatched outside of any
/// transaction even when the session has one active.
pub(crate) const NON_TRANSACTIONAL_COMMANDS: &[&str] = &[
    "ping",
    "hello",
    "ismaster",
    "buildinfo",
    "serverstatus",
    "listdatabases",
    "endsessions",
];

/// A trait modeling the behavior of a server side operation.
pub(crate) trait Operation {
    /// The output type of this operation.
    type O;

    /// The name of the server side command associated with this operation.
    const NAME: &'static str;

    /// Returns the command that should be sent to the server as part of this operation.
    fn build(&mut self) -> Result<Command>;

    /// Interprets the server response to the command. Replies reporting `ok: 0` never reach
    /// this method.
    fn handle_response(&self, response: Document) -> Result<Self::O>;

    /// The role of this operation with respect to a session's transaction.
    fn kind(&self) -> CommandKind;

    /// Criteria to use for selecting the server that this operation will be executed on.
    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        None
    }

    /// Whether this operation joins the session's transaction when one is active.
    fn runs_in_transaction(&self) -> bool {
        true
    }

    /// The name of the command this operation sends.
    fn name(&self) -> &str {
        Self::NAME
    }
}

pub(crate) fn deserialize_response<T: DeserializeOwned>(response: Document) -> Result<T> {
    bson::from_document(response).map_err(Into::into)
}

/// The shape of a write command reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WriteResponseBody {
    n: u64,

    #[serde(default)]
    write_errors: Option<Vec<CommandError>>,
}

impl WriteResponseBody {
    /// Returns the number of affected documents, or the first document-level error.
    pub(crate) fn validate(self) -> Result<u64> {
        match self.write_errors.and_then(|errors| errors.into_iter().next()) {
            Some(write_error) => Err(ErrorKind::Write(write_error).into()),
            None => Ok(self.n),
        }
    }
}

/// The shape of a `find` or `getMore` reply.
#[derive(Debug, Deserialize)]
pub(crate) struct CursorBody {
    pub(crate) cursor: CursorInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CursorInfo {
    pub(crate) id: i64,

    #[serde(alias = "nextBatch")]
    pub(crate) first_batch: Vec<Document>,
}
