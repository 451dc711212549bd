use crate::{
    bson::Document,
    command::Command,
    error::{Error, Result},
    event::command::CommandKind,
    operation::{Operation, NON_TRANSACTIONAL_COMMANDS},
    selection_criteria::SelectionCriteria,
};

/// Runs an arbitrary command document. The first key of the document names the command.
#[derive(Debug)]
pub(crate) struct RunCommand {
    db: String,
    command: Document,
    command_name: String,
    selection_criteria: Option<SelectionCriteria>,
}

impl RunCommand {
    pub(crate) fn new(
        db: String,
        command: Document,
        selection_criteria: Option<SelectionCriteria>,
    ) -> Result<Self> {
        let command_name = command
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| Error::invalid_argument("an empty document cannot be a command"))?;

        Ok(Self {
            db,
            command,
            command_name,
            selection_criteria,
        })
    }
}

impl Operation for RunCommand {
    type O = Document;

    // The actual name is determined at runtime.
    const NAME: &'static str = "$genericRunCommand";

    fn build(&mut self) -> Result<Command> {
        Ok(Command::new(
            &self.command_name,
            &self.db,
            self.command.clone(),
        ))
    }

    fn handle_response(&self, response: Document) -> Result<Self::O> {
        Ok(response)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Command
    }

    fn selection_criteria(&self) -> Option<&SelectionCriteria> {
        self.selection_criteria.as_ref()
    }

    fn runs_in_transaction(&self) -> bool {
        !NON_TRANSACTIONAL_COMMANDS.contains(&self.command_name.to_lowercase().as_str())
    }

    fn name(&self) -> &str {
        self.command_name.as_str()
    }
}
