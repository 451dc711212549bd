use serde::Deserialize;

use crate::{
    bson::{doc, Document},
    coll::Namespace,
    command::Command,
    error::Result,
    event::command::CommandKind,
    operation::{deserialize_response, Operation},
};

#[derive(Debug)]
pub(crate) struct Count {
    ns: Namespace,
    filter: Document,
}

impl Count {
    pub(crate) fn new(ns: Namespace, filter: Document) -> Self {
        Self { ns, filter }
    }
}

impl Operation for Count {
    type O = u64;

    const NAME: &'static str = "count";

    fn build(&mut self) -> Result<Command> {
        let body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "query": self.filter.clone(),
        };

        Ok(Command::new(Self::NAME, &self.ns.db, body))
    }

    fn handle_response(&self, response: Document) -> Result<Self::O> {
        let response: ResponseBody = deserialize_response(response)?;
        Ok(response.n)
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Read
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    n: u64,
}
