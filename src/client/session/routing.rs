use std::time::Duration;

use crate::{
    client::session::{ClientSession, TransactionState},
    error::Result,
    event::command::CommandKind,
    options::ServerAddress,
    sdam::{select_server, TopologyDescription},
    selection_criteria::SelectionCriteria,
};

/// What the dispatcher knows about an operation when routing it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct OperationRequest {
    /// Whether the operation runs as part of the session's active transaction.
    pub(crate) in_transaction: bool,

    pub(crate) kind: CommandKind,
}

impl ClientSession {
    /// The router a request must go to without consulting server selection, if any.
    pub(crate) fn pinned_target(&self, request: &OperationRequest) -> Option<&ServerAddress> {
        if !request.in_transaction {
            return None;
        }

        match self.transaction.state {
            TransactionState::InProgress
            | TransactionState::Committing
            | TransactionState::Aborting => self.transaction.pinned(),
            TransactionState::None | TransactionState::Starting => None,
        }
    }

    /// Decides which server `request` is sent to.
    ///
    /// Operations outside of a transaction release any pin and go through normal server
    /// selection. Operations inside a pinned transaction go to the pinned router without looking
    /// at `topology`. Otherwise a server is selected, and when it is a router the session is
    /// pinned to it for the rest of the transaction.
    pub(crate) fn resolve_target(
        &mut self,
        request: &OperationRequest,
        topology: &TopologyDescription,
        criteria: &SelectionCriteria,
        local_threshold: Option<Duration>,
    ) -> Result<ServerAddress> {
        if !request.in_transaction {
            self.transaction.unpin();
            return select_server(topology, criteria, local_threshold);
        }

        if let Some(address) = self.pinned_target(request) {
            return Ok(address.clone());
        }

        let address = select_server(topology, criteria, local_threshold)?;
        let server_type = topology.server(&address).map(|server| server.server_type());
        self.transaction.record_route(&address, server_type);
        Ok(address)
    }
}
