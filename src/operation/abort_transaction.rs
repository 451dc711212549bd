use crate::{
    bson::{doc, Document},
    command::Command,
    error::Result,
    event::command::CommandKind,
    operation::Operation,
};

pub(crate) struct AbortTransaction;

impl Operation for AbortTransaction {
    type O = ();

    const NAME: &'static str = "abortTransaction";

    fn build(&mut self) -> Result<Command> {
        let body = doc! {
            Self::NAME: 1,
        };

        Ok(Command::new(Self::NAME, "admin", body))
    }

    fn handle_response(&self, _response: Document) -> Result<Self::O> {
        Ok(())
    }

    fn kind(&self) -> CommandKind {
        CommandKind::AbortTransaction
    }
}
