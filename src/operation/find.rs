use crate::{
    bson::{doc, Document},
    coll::{options::FindOptions, Namespace},
    command::Command,
    error::{Error, Result},
    event::command::CommandKind,
    operation::{deserialize_response, CursorBody, CursorInfo, Operation},
    selection_criteria::SelectionCriteria,
};

#[derive(Debug)]
pub(crate) struct Find {
    ns: Namespace,
    filter: Document,
    options: Option<FindOptions>,
}

impl Find {
    pub(crate) fn new(ns: Namespace, filter: Document, options: Option<FindOptions>) -> Self {
        Self {
            ns,
            filter,
            options,
        }
    }
}

impl Operation for Find {
    type O = CursorInfo;

    const NAME: &'static str = "find";

    fn build(&mut self) -> Result<Command> {
        let mut body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "filter": self.filter.clone(),
        };

        if let Some(ref options) = self.options {
            if let Some(limit) = options.limit {
                // negative limits request a single batch.
                if limit < 0 {
                    body.insert("singleBatch", true);
                }
                body.insert("limit", limit.abs());
            }

            if let Some(batch_size) = options.batch_size {
                let batch_size = i32::try_from(batch_size).map_err(|_| {
                    Error::invalid_argument("The batch size must fit into a signed 32-bit integer")
                })?;
                body.insert("batchSize", batch_size);
            }

            if let Some(ref sort) = options.sort {
                body.insert("sort", sort.clone());
            }

            if let Some(ref projection) = options.projection {
                body.insert("projection", projection.clone());
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
        self.options
            .as_ref()
            .and_then(|opts| opts.selection_criteria.as_ref())
    }
}
