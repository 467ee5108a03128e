//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the single capability a document store client
//! has to provide: write documents, execute a [`Query`], execute an aggregation
//! [`Pipeline`] and manage collections. Backends never see raw client
//! parameters, and callers never see the backend: it is owned privately by a
//! [`DocumentStore`](crate::store::DocumentStore), which routes every
//! operation through the collection's hook pipeline.
//!
//! # Examples
//!
//! ```ignore
//! use docgate::backend::StoreBackend;
//! use bson::{Uuid, Bson, doc};
//!
//! let backend = MyBackendImpl::new();
//!
//! let uuid = Uuid::new();
//! let doc = Bson::Document(doc! { "name": "The Forest Hiker", "price": 397 });
//! backend.insert_documents(vec![(uuid, doc)], "tours").await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::fmt::Debug;

use crate::{aggregate::Pipeline, error::DocumentStoreResult, query::Query};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks.
///
/// # Error Handling
///
/// Failures of the underlying store surface as
/// [`DocumentStoreError::StoreUnavailable`](crate::error::DocumentStoreError::StoreUnavailable)
/// and are never retried.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// The collection is created if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if a document with one of the IDs is already stored.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Replaces existing documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](crate::error::DocumentStoreError::NotFound) if one of
    /// the IDs is not stored.
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Deletes documents from a collection by their IDs.
    ///
    /// Missing IDs are skipped.
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()>;

    /// Queries documents in a collection.
    ///
    /// Applies, in order: the ID restriction, the filter, the sort keys, the
    /// offset and limit window, then the projection. Documents with equal sort
    /// keys keep their insertion order.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Runs an aggregation pipeline over a collection, stage by stage.
    async fn aggregate_documents(
        &self,
        pipeline: Pipeline,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Creates a new, empty collection.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and every document in it.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Asks the store to reject a second document with the same value of
    /// `field`.
    ///
    /// Backends without indexes keep the default, which does nothing;
    /// [`TypedCollection`](crate::collection::TypedCollection) checks
    /// [`Document::unique_fields`](crate::document::Document::unique_fields)
    /// before every write either way.
    async fn add_unique_index(&self, _collection: &str, _field: &str) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Releases the resources held by the backend.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for backends that need asynchronous setup (connections, pools).
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
