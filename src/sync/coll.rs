use std::borrow::Borrow;

use derive_where::derive_where;
use serde::{de::DeserializeOwned, Serialize};

use super::ClientSession;
use crate::{
    bson::Document,
    error::Result,
    options::FindOptions,
    results::{DeleteResult, InsertManyResult, InsertOneResult},
    sync::block_on,
    Collection as AsyncCollection,
    Namespace,
};

/// `Collection` is the client-side abstraction of a collection. It wraps an async
/// [`Collection`](crate::Collection) and runs its operations on the sync API's runtime.
#[derive_where(Clone, Debug)]
pub struct Collection<T> {
    async_collection: AsyncCollection<T>,
}

impl<T> Collection<T> {
    pub(crate) fn new(async_collection: AsyncCollection<T>) -> Self {
        Self { async_collection }
    }

    /// Gets the name of the `Collection`.
    pub fn name(&self) -> &str {
        self.async_collection.name()
    }

    /// Gets the namespace of the `Collection`.
    pub fn namespace(&self) -> Namespace {
        self.async_collection.namespace()
    }

    /// Deletes all documents matching `filter`.
    pub fn delete_many(&self, filter: Document) -> Result<DeleteResult> {
        block_on(self.async_collection.delete_many(filter))
    }

    /// Deletes all documents matching `filter` using the provided `ClientSession`.
    pub fn delete_many_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<DeleteResult> {
        block_on(
            self.async_collection
                .delete_many_with_session(filter, &mut session.async_client_session),
        )
    }

    /// Counts the documents matching `filter`.
    pub fn count_documents(&self, filter: Document) -> Result<u64> {
        block_on(self.async_collection.count_documents(filter))
    }

    /// Counts the documents matching `filter` using the provided `ClientSession`.
    pub fn count_documents_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<u64> {
        block_on(
            self.async_collection
                .count_documents_with_session(filter, &mut session.async_client_session),
        )
    }
}

impl<T: Serialize> Collection<T> {
    /// Inserts `doc` into the collection.
    pub fn insert_one(&self, doc: impl Borrow<T>) -> Result<InsertOneResult> {
        block_on(self.async_collection.insert_one(doc))
    }

    /// Inserts `doc` into the collection using the provided `ClientSession`.
    pub fn insert_one_with_session(
        &self,
        doc: impl Borrow<T>,
        session: &mut ClientSession,
    ) -> Result<InsertOneResult> {
        block_on(
            self.async_collection
                .insert_one_with_session(doc, &mut session.async_client_session),
        )
    }

    /// Inserts the documents in `docs` into the collection.
    pub fn insert_many(
        &self,
        docs: impl IntoIterator<Item = impl Borrow<T>>,
    ) -> Result<InsertManyResult> {
        block_on(self.async_collection.insert_many(docs))
    }
}

impl<T: DeserializeOwned> Collection<T> {
    /// Finds the documents in the collection matching `filter`.
    pub fn find(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<T>> {
        block_on(self.async_collection.find(filter, options))
    }

    /// Finds the documents in the collection matching `filter` using the provided
    /// `ClientSession`.
    pub fn find_with_session(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
        session: &mut ClientSession,
    ) -> Result<Vec<T>> {
        block_on(self.async_collection.find_with_session(
            filter,
            options,
            &mut session.async_client_session,
        ))
    }

    /// Finds a single document in the collection matching `filter`.
    pub fn find_one(&self, filter: Document) -> Result<Option<T>> {
        block_on(self.async_collection.find_one(filter))
    }
}
