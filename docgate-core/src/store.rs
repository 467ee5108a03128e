//! Main document store interface.
//!
//! [`DocumentStore`] owns a backend, the query configuration and one
//! [`HookPipeline`] per collection. The backend is never exposed: documents
//! are reached through [`TypedCollection`]s only, which route every operation
//! through the collection's pipeline.
//!
//! # Example
//!
//! ```ignore
//! use docgate::store::DocumentStore;
//!
//! let store = DocumentStore::builder(backend)
//!     .with_query_config(config)
//!     .with_hooks::<Tour>(tour_hooks(sink))
//!     .build();
//! let tours = store.typed_collection::<Tour>();
//! ```

use std::collections::HashMap;

use crate::{
    backend::StoreBackend,
    builder::QueryBuilder,
    collection::TypedCollection,
    config::QueryConfig,
    document::Document,
    error::DocumentStoreResult,
    hook::HookPipeline,
};

/// A document store bound to a specific backend implementation.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    builder: QueryBuilder,
    hooks: HashMap<&'static str, HookPipeline>,
    unhooked: HookPipeline,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a store with default query settings and no hooks.
    pub fn new(backend: B) -> Self {
        Self::builder(backend).build()
    }

    pub fn builder(backend: B) -> DocumentStoreBuilder<B> {
        DocumentStoreBuilder {
            backend,
            config: QueryConfig::default(),
            hooks: HashMap::new(),
        }
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's
    /// `collection_name()` method. Collections without registered hooks get
    /// an empty pipeline.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        let name = D::collection_name();
        let hooks = self.hooks.get(name).unwrap_or(&self.unhooked);

        TypedCollection::new(name.to_string(), &self.backend, hooks, &self.builder)
    }

    pub fn query_config(&self) -> &QueryConfig {
        self.builder.config()
    }

    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Creates a unique index for every field `D` declares unique.
    ///
    /// Writes through a [`TypedCollection`] check uniqueness without it; the
    /// index closes the gap between that check and the write on backends
    /// that support one.
    pub async fn ensure_unique_indexes<D: Document>(&self) -> DocumentStoreResult<()> {
        for field in D::unique_fields() {
            self.backend
                .add_unique_index(D::collection_name(), field)
                .await?;
        }

        Ok(())
    }

    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}

/// Builder for [`DocumentStore`]. Hook pipelines are fixed once built.
#[derive(Debug)]
pub struct DocumentStoreBuilder<B: StoreBackend> {
    backend: B,
    config: QueryConfig,
    hooks: HashMap<&'static str, HookPipeline>,
}

impl<B: StoreBackend> DocumentStoreBuilder<B> {
    pub fn with_query_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers the pipeline used by the collection of `D`, replacing any
    /// earlier one.
    pub fn with_hooks<D: Document>(mut self, hooks: HookPipeline) -> Self {
        self.hooks.insert(D::collection_name(), hooks);
        self
    }

    pub fn build(self) -> DocumentStore<B> {
        DocumentStore {
            backend: self.backend,
            builder: QueryBuilder::new(self.config),
            hooks: self.hooks,
            unhooked: HookPipeline::empty(),
        }
    }
}
