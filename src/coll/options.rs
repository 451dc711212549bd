//! Contains the options for collection-level operations.

use typed_builder::TypedBuilder;

use crate::{bson::Document, selection_criteria::SelectionCriteria};

/// Specifies the options to a [`Collection::find`](crate::Collection::find) operation.
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(strip_option)))]
#[non_exhaustive]
pub struct FindOptions {
    /// The number of documents the server should return per cursor batch.
    pub batch_size: Option<u32>,

    /// The maximum number of documents to query.
    /// If a negative number is specified, the documents will be returned in a single batch limited
    /// in number by the positive value of the specified limit.
    pub limit: Option<i64>,

    /// Limits the fields of the document being returned.
    pub projection: Option<Document>,

    /// The criteria used to select a server for this operation. Inside a transaction only a
    /// primary read preference is accepted.
    pub selection_criteria: Option<SelectionCriteria>,

    /// The order of the documents for the purposes of the operation.
    pub sort: Option<Document>,
}
