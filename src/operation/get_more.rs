use crate::{
    bson::{doc, Document},
    coll::Namespace,
    command::Command,
    error::{Error, Result},
    event::command::CommandKind,
    operation::{deserialize_response, CursorBody, CursorInfo, Operation},
    options::ServerAddress,
    selection_criteria::SelectionCriteria,
};

/// Fetches the next batch of a cursor. Cursors live on the server that created them, so the
/// operation only selects that server.
#[derive(Debug)]
pub(crate) struct GetMore {
    ns: Namespace,
    cursor_id: i64,
    selection_criteria: SelectionCriteria,
    batch_size: Option<u32>,
}

impl GetMore {
    pub(crate) fn new(
        ns: Namespace,
        cursor_id: i64,
        address: ServerAddress,
        batch_size: Option<u32>,
    ) -> Self {
        Self {
            ns,
            cursor_id,
            selection_criteria: SelectionCriteria::from_address(address),
            batch_size,
        }
    }
}

impl Operation for GetMore {
    type O = CursorInfo;

    const NAME: &'static str = "getMore";

    fn build(&mut self) -> Result<Command> {
        let mut body = doc! {
            Self::NAME: self.cursor_id,
            "collection": self.ns.coll.clone(),
        };

        if let Some(batch_size) = self.batch_size {
            let batch_size = i32::try_from(batch_size).map_err(|_| {
                Error::invalid_argument("The batch size must fit into a signed 32-bit integer")
            })?;
            if batch_size != 0 {
                body.insert("batchSize", batch_size);
            }
        }

        Ok(Command::new(Self::NAME, &self.ns.db, body))
    }

    fn handle_response(&self, response: Document) -> Result<Self::O> {
        let response: CursorBody = deserialize_response(response)?;
        Ok(response.cursor)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Read
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        Some(&self.selection_criteria)
    }
}
