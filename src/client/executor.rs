use std::{borrow::BorrowMut, time::Instant};

use crate::{
    client::session::{OperationRequest, TransactionState},
    command::{next_request_id, Command},
    error::{Error, ErrorKind, Result},
    event::command::{
        CommandEvent,
        CommandFailedEvent,
        CommandRoutedEvent,
        CommandSucceededEvent,
    },
    operation::Operation,
    options::ServerAddress,
    sdam::ServerType,
    selection_criteria::{ReadPreference, SelectionCriteria},
    Client,
    ClientSession,
};

/// The output of an operation together with the server it ran on.
pub(crate) struct ExecutionDetails<T: Operation> {
    pub(crate) output: T::O,
    pub(crate) address: ServerAddress,
}

impl Client {
    /// Execute the given operation.
    ///
    /// Server selection will performed using the criteria specified on the operation, if any, and
    /// an implicit session will not be created.
    pub(crate) async fn execute_operation<T: Operation>(
        &self,
        mut op: impl BorrowMut<T>,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<T::O> {
        self.execute_operation_with_details(op.borrow_mut(), session)
            .await
            .map(|details| details.output)
    }

    /// Execute the given operation, returning the server it ran on along with its output.
    pub(crate) async fn execute_operation_with_details<T: Operation>(
        &self,
        op: &mut T,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<ExecutionDetails<T>> {
        let mut session = session.into();

        let request = OperationRequest {
            in_transaction: op.runs_in_transaction()
                && session
                    .as_deref()
                    .is_some_and(|session| session.transaction.is_active()),
            kind: op.kind(),
        };

        if let Some(session) = session.as_deref() {
            if session.is_ended() {
                return Err(ErrorKind::SessionEnded.into());
            }
            if !self.same_client(&session.client()) {
                return Err(Error::invalid_argument(
                    "the session provided to an operation must be created from the same client \
                     as the collection/database",
                ));
            }
            session.transaction.check_operation(request.kind, op.name())?;
        }

        let criteria = self.operation_criteria(op, session.as_deref(), &request)?;

        // Captured before routing, which moves a starting transaction along.
        let transaction_fields = session
            .as_deref()
            .filter(|_| request.in_transaction)
            .map(|session| {
                (
                    session.txn_number(),
                    session.transaction_state() == TransactionState::Starting,
                )
            });

        let mut cmd = op.build()?;
        let address = self
            .resolve_target(session.as_deref_mut(), &request, &criteria, op.name())
            .await?;

        if let Some(session) = session.as_deref() {
            cmd.set_session(session);
        }
        if let Some((txn_number, starts_transaction)) = transaction_fields {
            cmd.set_txn_number(txn_number);
            if starts_transaction {
                cmd.set_start_transaction();
            }
            cmd.set_autocommit();
        }

        if let Some(read_preference) = criteria.as_read_pref() {
            let routed_to_router = self
                .inner
                .topology
                .peek_latest()
                .server(&address)
                .is_some_and(|server| server.server_type() == ServerType::Mongos);
            if routed_to_router && read_preference != &ReadPreference::Primary {
                cmd.set_read_preference(read_preference)?;
            }
        }

        let pinned = request.in_transaction
            && session
                .as_deref()
                .and_then(|session| session.pinned_router())
                == Some(&address);
        let session_id = session.as_deref().map(|session| session.uuid());
        let request_id = next_request_id();
        let command_name = cmd.name.clone();

        self.emit_command_event(|| {
            CommandEvent::Routed(CommandRoutedEvent {
                session_id,
                address: address.clone(),
                command_kind: request.kind,
                command_name: command_name.clone(),
                db: cmd.target_db.clone(),
                request_id,
                pinned,
                command: cmd.body.clone(),
                app_name: self.inner.options.app_name.clone(),
            })
        });

        let start_time = Instant::now();
        let result = self
            .inner
            .executor
            .execute(&address, cmd)
            .await
            .and_then(|reply| {
                if Command::reply_ok(&reply) {
                    Ok(reply)
                } else {
                    Err(Error::from_command_reply(&reply))
                }
            });
        let duration = start_time.elapsed();

        match result {
            Ok(reply) => {
                self.emit_command_event(|| {
                    CommandEvent::Succeeded(CommandSucceededEvent {
                        duration,
                        reply: reply.clone(),
                        command_name: command_name.clone(),
                        request_id,
                        address: address.clone(),
                    })
                });
                let output = op.handle_response(reply)?;
                Ok(ExecutionDetails { output, address })
            }
            Err(error) => {
                self.emit_command_event(|| {
                    CommandEvent::Failed(CommandFailedEvent {
                        duration,
                        command_name: command_name.clone(),
                        failure: error.clone(),
                        request_id,
                        address: address.clone(),
                    })
                });
                Err(error)
            }
        }
    }

    /// The criteria used to select a server for `op`. Inside a transaction, only a primary read
    /// preference may be given for the operation, and the transaction's criteria apply when the
    /// operation names none.
    fn operation_criteria<T: Operation>(
        &self,
        op: &T,
        session: Option<&ClientSession>,
        request: &OperationRequest,
    ) -> Result<SelectionCriteria> {
        let op_criteria = op.selection_criteria();

        let inherited = if request.in_transaction {
            if op_criteria
                .and_then(|criteria| criteria.as_read_pref())
                .is_some_and(|read_pref| read_pref != &ReadPreference::Primary)
            {
                return Err(Error::invalid_argument(
                    "read preference in a transaction must be primary",
                ));
            }
            session
                .and_then(|session| session.transaction.options.as_ref())
                .and_then(|options| options.selection_criteria.as_ref())
        } else {
            self.selection_criteria()
        };

        Ok(op_criteria
            .or(inherited)
            .cloned()
            .unwrap_or(SelectionCriteria::ReadPreference(ReadPreference::Primary)))
    }
}
