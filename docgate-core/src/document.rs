//! Core traits for document representation, validation and serialization.
//!
//! Every entity stored through a [`DocumentStore`](crate::store::DocumentStore)
//! implements [`Document`]. Conversion to and from BSON comes for free
//! through [`DocumentExt`].

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreResult;

/// Core trait that all documents stored in a document store must implement.
///
/// Every document has a unique identifier and belongs to one collection. The
/// optional methods describe the entity's write-time rules and the computed
/// (virtual) fields attached to documents returned by list queries.
///
/// # Example
///
/// ```ignore
/// use docgate::document::Document;
/// use docgate::error::{DocumentStoreError, DocumentStoreResult};
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: Uuid,
///     pub name: String,
/// }
///
/// impl Document for User {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "users"
///     }
///
///     fn validate(&self) -> DocumentStoreResult<()> {
///         if self.name.is_empty() {
///             return Err(DocumentStoreError::validation("name", "is required"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this document belongs to.
    ///
    /// This should be a static, lowercase identifier (e.g., "users", "tours").
    fn collection_name() -> &'static str;

    /// Checks the entity invariants. Runs before every insert and update.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ValidationFailed`](crate::error::DocumentStoreError::ValidationFailed)
    /// naming the first field that violates a constraint.
    fn validate(&self) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Adds computed fields to a stored document before it is returned.
    ///
    /// Implementations must tolerate projected documents where the source
    /// fields are missing.
    fn apply_virtuals(_document: &mut bson::Document) {}

    /// Fields whose values may appear on at most one document of the
    /// collection, hidden documents included.
    fn unique_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Extension trait providing serialization/deserialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}
