//! Error types and result types for document access operations.
//!
//! Every failure path in the workspace yields one [`DocumentStoreError`] variant.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when translating, intercepting
/// or executing a document store operation.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A filter parameter used an operator outside of `gte`, `gt`, `lte`, `lt`.
    ///
    /// Raised by the query builder before any store call is made.
    #[error("Invalid filter operator: {0}")]
    InvalidFilterOperator(String),
    /// A `fields` parameter mixed included and excluded fields.
    #[error("Invalid projection: {0}")]
    InvalidProjection(String),
    /// A document violates an entity invariant at write time.
    #[error("Validation failed for `{field}`: {constraint}")]
    ValidationFailed {
        /// The offending field.
        field: String,
        /// Human readable description of the violated constraint.
        constraint: String,
    },
    /// No visible document matches the given identifier.
    ///
    /// Secret documents are reported as not found.
    #[error("Document {0} not found in collection {1}")]
    NotFound(String, String),
    /// A document with the given ID already exists in the collection.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A lifecycle hook aborted the operation.
    #[error("Hook `{hook}` failed: {reason}")]
    HookFailed {
        /// Name of the failing hook.
        hook: &'static str,
        /// Why the hook gave up.
        reason: String,
    },
    /// The underlying storage failed to execute the operation. Never retried.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// Serialization/deserialization error when converting between document formats (BSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl DocumentStoreError {
    /// Shorthand for building a [`DocumentStoreError::ValidationFailed`].
    pub fn validation(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        DocumentStoreError::ValidationFailed {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
