use crate::{
    bson::{doc, Document},
    coll::Namespace,
    command::Command,
    error::Result,
    event::command::CommandKind,
    operation::{deserialize_response, Operation, WriteResponseBody},
    results::DeleteResult,
};

#[derive(Debug)]
pub(crate) struct Delete {
    ns: Namespace,
    filter: Document,
    limit: Option<u32>,
}

impl Delete {
    /// Deletes every document matching `filter`.
    pub(crate) fn new(ns: Namespace, filter: Document) -> Self {
        Self {
            ns,
            filter,
            limit: None,
        }
    }
}

impl Operation for Delete {
    type O = DeleteResult;

    const NAME: &'static str = "delete";

    fn build(&mut self) -> Result<Command> {
        let delete = doc! {
            "q": self.filter.clone(),
            "limit": self.limit.unwrap_or(0),
        };

        let body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "deletes": [delete],
            "ordered": true,
        };

        Ok(Command::new(Self::NAME, &self.ns.db, body))
    }

    fn handle_response(&self, response: Document) -> Result<Self::O> {
        let response: WriteResponseBody = deserialize_response(response)?;
        let deleted_count = response.validate()?;
        Ok(DeleteResult { deleted_count })
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Write
    }
}
