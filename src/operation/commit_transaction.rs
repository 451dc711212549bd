use std::time::Duration;

use crate::{
    bson::{doc, Document},
    command::Command,
    error::Result,
    event::command::CommandKind,
    operation::Operation,
};

pub(crate) struct CommitTransaction {
    max_commit_time: Option<Duration>,
}

impl CommitTransaction {
    pub(crate) fn new(max_commit_time: Option<Duration>) -> Self {
        Self { max_commit_time }
    }
}

impl Operation for CommitTransaction {
    type O = ();

    const NAME: &'static str = "commitTransaction";

    fn build(&mut self) -> Result<Command> {
        let mut body = doc! {
            Self::NAME: 1,
        };

        if let Some(max_commit_time) = self.max_commit_time {
            body.insert(
                "maxTimeMS",
                i64::try_from(max_commit_time.as_millis()).unwrap_or(i64::MAX),
            );
        }

        Ok(Command::new(Self::NAME, "admin", body))
    }

    fn handle_response(&self, _response: Document) -> Result<Self::O> {
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::CommitTransaction
    }
}
