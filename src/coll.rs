pub mod options;

use std::{borrow::Borrow, fmt, marker::PhantomData};

use derive_where::derive_where;
use serde::{de::DeserializeOwned, Serialize};

use self::options::FindOptions;
use crate::{
    bson::{self, Document},
    error::{Error, Result},
    operation::{Count, Delete, Find, GetMore, Insert},
    results::{DeleteResult, InsertManyResult, InsertOneResult},
    Client,
    ClientSession,
    Database,
};

/// `Collection` is the client-side abstraction of a collection. It can be used to perform
/// CRUD operations, each of which is routed through the owning [`Client`].
///
/// A [`Collection`] can be parameterized with any type that implements the `Serialize` and
/// `Deserialize` traits from the [`serde`](https://serde.rs/) crate, including [`Document`].
///
/// Every operation has a `_with_session` variant. Passing a [`ClientSession`] with an active
/// transaction runs the operation as part of that transaction, on the router the transaction is
/// pinned to.
#[derive_where(Clone)]
pub struct Collection<T> {
    client: Client,
    db: String,
    name: String,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("db", &self.db)
            .field("name", &self.name)
            .finish()
    }
}

impl<T> Collection<T> {
    pub(crate) fn new(db: &Database, name: &str) -> Self {
        Self {
            client: db.client().clone(),
            db: db.name().to_string(),
            name: name.to_string(),
            _phantom: PhantomData,
        }
    }

    /// Gets a clone of the `Collection` with a different type `U`.
    pub fn clone_with_type<U>(&self) -> Collection<U> {
        Collection {
            client: self.client.clone(),
            db: self.db.clone(),
            name: self.name.clone(),
            _phantom: PhantomData,
        }
    }

    /// Gets the name of the `Collection`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the namespace of the `Collection`.
    ///
    /// The namespace of a collection is the concatenation of the name of the database containing
    /// it, the '.' character, and the name of the collection itself.
    pub fn namespace(&self) -> Namespace {
        Namespace {
            db: self.db.clone(),
            coll: self.name.clone(),
        }
    }

    /// Deletes all documents matching `filter`.
    pub async fn delete_many(&self, filter: Document) -> Result<DeleteResult> {
        self.delete_many_common(filter, None).await
    }

    /// Deletes all documents matching `filter` using the provided `ClientSession`.
    pub async fn delete_many_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<DeleteResult> {
        self.delete_many_common(filter, session).await
    }

    async fn delete_many_common(
        &self,
        filter: Document,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<DeleteResult> {
        let op = Delete::new(self.namespace(), filter);
        self.client.execute_operation(op, session).await
    }

    /// Counts the documents matching `filter`.
    pub async fn count_documents(&self, filter: Document) -> Result<u64> {
        self.count_documents_common(filter, None).await
    }

    /// Counts the documents matching `filter` using the provided `ClientSession`.
    pub async fn count_documents_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<u64> {
        self.count_documents_common(filter, session).await
    }

    async fn count_documents_common(
        &self,
        filter: Document,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<u64> {
        let op = Count::new(self.namespace(), filter);
        self.client.execute_operation(op, session).await
    }
}

impl<T> Collection<T>
where
    T: Serialize,
{
    /// Inserts `doc` into the collection. An `_id` is generated when the document has none.
    pub async fn insert_one(&self, doc: impl Borrow<T>) -> Result<InsertOneResult> {
        self.insert_one_common(doc.borrow(), None).await
    }

    /// Inserts `doc` into the collection using the provided `ClientSession`.
    pub async fn insert_one_with_session(
        &self,
        doc: impl Borrow<T>,
        session: &mut ClientSession,
    ) -> Result<InsertOneResult> {
        self.insert_one_common(doc.borrow(), session).await
    }

    async fn insert_one_common(
        &self,
        doc: &T,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<InsertOneResult> {
        let doc = bson::to_document(doc)?;
        self.insert_many_common(vec![doc], session)
            .await
            .map(InsertOneResult::from_insert_many_result)
    }

    /// Inserts the documents in `docs` into the collection.
    pub async fn insert_many(
        &self,
        docs: impl IntoIterator<Item = impl Borrow<T>>,
    ) -> Result<InsertManyResult> {
        let docs = serialize_all(docs)?;
        self.insert_many_common(docs, None).await
    }

    /// Inserts the documents in `docs` into the collection using the provided `ClientSession`.
    pub async fn insert_many_with_session(
        &self,
        docs: impl IntoIterator<Item = impl Borrow<T>>,
        session: &mut ClientSession,
    ) -> Result<InsertManyResult> {
        let docs = serialize_all(docs)?;
        self.insert_many_common(docs, session).await
    }

    async fn insert_many_common(
        &self,
        docs: Vec<Document>,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<InsertManyResult> {
        let op = Insert::new(self.namespace(), docs);
        self.client.execute_operation(op, session).await
    }
}

impl<T> Collection<T>
where
    T: DeserializeOwned,
{
    /// Finds the documents in the collection matching `filter`, following the cursor until it
    /// is exhausted.
    pub async fn find(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> Result<Vec<T>> {
        self.find_common(filter, options.into(), None).await
    }

    /// Finds the documents in the collection matching `filter` using the provided
    /// `ClientSession`.
    pub async fn find_with_session(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
        session: &mut ClientSession,
    ) -> Result<Vec<T>> {
        self.find_common(filter, options.into(), Some(session)).await
    }

    /// Finds a single document in the collection matching `filter`.
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>> {
        let options = FindOptions::builder().limit(-1).build();
        let mut docs = self.find_common(filter, Some(options), None).await?;
        Ok(docs.pop())
    }

    /// Finds a single document in the collection matching `filter` using the provided
    /// `ClientSession`.
    pub async fn find_one_with_session(
        &self,
        filter: Document,
        session: &mut ClientSession,
    ) -> Result<Option<T>> {
        let options = FindOptions::builder().limit(-1).build();
        let mut docs = self
            .find_common(filter, Some(options), Some(session))
            .await?;
        Ok(docs.pop())
    }

    async fn find_common(
        &self,
        filter: Document,
        options: Option<FindOptions>,
        mut session: Option<&mut ClientSession>,
    ) -> Result<Vec<T>> {
        let batch_size = options.as_ref().and_then(|options| options.batch_size);
        let mut find = Find::new(self.namespace(), filter, options);
        let details = self
            .client
            .execute_operation_with_details(&mut find, session.as_deref_mut())
            .await?;

        let address = details.address;
        let mut cursor = details.output;
        let mut docs = Vec::new();
        loop {
            for doc in cursor.first_batch.drain(..) {
                docs.push(bson::from_document(doc).map_err(Error::from)?);
            }
            if cursor.id == 0 {
                return Ok(docs);
            }

            let get_more = GetMore::new(self.namespace(), cursor.id, address.clone(), batch_size);
            cursor = self
                .client
                .execute_operation(get_more, session.as_deref_mut())
                .await?;
        }
    }
}

fn serialize_all<T: Serialize>(
    docs: impl IntoIterator<Item = impl Borrow<T>>,
) -> Result<Vec<Document>> {
    docs.into_iter()
        .map(|doc| bson::to_document(doc.borrow()).map_err(Error::from))
        .collect()
}

/// A struct modeling the canonical name for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The name of the database associated with this namespace.
    pub db: String,

    /// The name of the collection this namespace corresponds to.
    pub coll: String,
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.db, self.coll)
    }
}
