use std::collections::HashMap;

use crate::{
    bson::{doc, oid::ObjectId, Bson, Document},
    coll::Namespace,
    command::Command,
    error::{Error, Result},
    event::command::CommandKind,
    operation::{deserialize_response, Operation, WriteResponseBody},
    results::InsertManyResult,
};

#[derive(Debug)]
pub(crate) struct Insert {
    ns: Namespace,
    documents: Vec<Document>,
    inserted_ids: Vec<Bson>,
}

impl Insert {
    pub(crate) fn new(ns: Namespace, documents: Vec<Document>) -> Self {
        Self {
            ns,
            documents,
            inserted_ids: Vec::new(),
        }
    }
}

impl Operation for Insert {
    type O = InsertManyResult;

    const NAME: &'static str = "insert";

    fn build(&mut self) -> Result<Command> {
        if self.documents.is_empty() {
            return Err(Error::invalid_argument("must insert at least one document"));
        }

        self.inserted_ids.clear();
        for document in self.documents.iter_mut() {
            let id = document
                .entry("_id".to_string())
                .or_insert_with(|| ObjectId::new().into())
                .clone();
            self.inserted_ids.push(id);
        }

        let body = doc! {
            Self::NAME: self.ns.coll.clone(),
            "documents": self.documents.clone(),
            "ordered": true,
        };

        Ok(Command::new(Self::NAME, &self.ns.db, body))
    }

    fn handle_response(&self, response: Document) -> Result<Self::O> {
        let response: WriteResponseBody = deserialize_response(response)?;
        response.validate()?;

        let inserted_ids: HashMap<usize, Bson> =
            self.inserted_ids.iter().cloned().enumerate().collect();
        Ok(InsertManyResult { inserted_ids })
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Write
    }
}
