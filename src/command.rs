//! The seam between the client and whatever carries commands to servers.

use std::sync::atomic::{AtomicI32, Ordering};

use futures_core::future::BoxFuture;

use crate::{
    bson::{Bson, Document},
    client::session::ClientSession,
    error::Result,
    options::ServerAddress,
    selection_criteria::ReadPreference,
};

/// Runs commands against a specific server. Implementations own connection handling, wire
/// encoding and authentication; the client only decides where each command goes.
///
/// Transport failures should be reported as [`ErrorKind::Io`](crate::error::ErrorKind::Io).
/// A reply with `ok: 0` should be returned as-is; the client turns it into an error.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Sends `command` to the server at `address` and returns its reply.
    fn execute<'a>(
        &'a self,
        address: &'a ServerAddress,
        command: Command,
    ) -> BoxFuture<'a, Result<Document>>;
}

/// A command ready to be sent to a server.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Command {
    /// The name of the command, e.g. "find".
    pub name: String,

    /// The database the command runs against.
    pub target_db: String,

    /// The full command document, including any session fields.
    pub body: Document,
}

impl Command {
    pub(crate) fn new(name: impl ToString, target_db: impl ToString, body: Document) -> Self {
        Self {
            name: name.to_string(),
            target_db: target_db.to_string(),
            body,
        }
    }

    pub(crate) fn set_session(&mut self, session: &ClientSession) {
        self.body.insert("lsid", session.id().clone());
    }

    pub(crate) fn set_txn_number(&mut self, txn_number: i64) {
        self.body.insert("txnNumber", txn_number);
    }

    pub(crate) fn set_start_transaction(&mut self) {
        self.body.insert("startTransaction", true);
    }

    pub(crate) fn set_autocommit(&mut self) {
        self.body.insert("autocommit", false);
    }

    pub(crate) fn set_read_preference(&mut self, read_preference: &ReadPreference) -> Result<()> {
        let read_preference = crate::bson::to_document(read_preference)?;
        self.body.insert("$readPreference", read_preference);
        Ok(())
    }

    /// Whether the server reported success. Servers encode `ok` as a double, an integer or a
    /// boolean.
    pub(crate) fn reply_ok(reply: &Document) -> bool {
        match reply.get("ok") {
            Some(Bson::Double(ok)) => *ok == 1.0,
            Some(Bson::Int32(ok)) => *ok == 1,
            Some(Bson::Int64(ok)) => *ok == 1,
            Some(Bson::Boolean(ok)) => *ok,
            _ => false,
        }
    }
}

/// Returns a new request id, unique among those handed out by this process.
pub(crate) fn next_request_id() -> i32 {
    static REQUEST_ID: AtomicI32 = AtomicI32::new(0);

    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}
