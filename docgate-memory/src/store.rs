//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON values in HashMaps behind async-aware read-write
//! locks. Every document remembers when it was inserted, so scans and ties in
//! sort order are resolved by insertion order.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Uuid, Bson};
use tracing::debug;

use docgate_core::{
    aggregate::Pipeline,
    query::Query,
    error::{DocumentStoreError, DocumentStoreResult},
    backend::{StoreBackend, StoreBackendBuilder},
};

use crate::{
    aggregate::run_pipeline,
    evaluator::{DocumentEvaluator, compare_documents},
};

#[derive(Debug, Clone)]
struct Entry {
    sequence: u64,
    document: Bson,
}

#[derive(Debug, Default)]
struct CollectionMap {
    next_sequence: u64,
    entries: HashMap<String, Entry>,
}

impl CollectionMap {
    /// Documents in insertion order.
    fn ordered(&self) -> Vec<(&str, &Entry)> {
        let mut entries = self
            .entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
            .collect::<Vec<_>>();
        entries.sort_by_key(|(_, entry)| entry.sequence);
        entries
    }
}

type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so
/// clones share the same underlying data.
///
/// # Performance
///
/// Queries scan all documents in a collection (no indexing).
///
/// # Example
///
/// ```ignore
/// use docgate_memory::InMemoryStore;
/// use docgate::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let id = Uuid::new();
/// let doc = Bson::Document(doc! { "name": "The Sea Explorer", "price": 497 });
/// store.insert_documents(vec![(id, doc)], "tours").await?;
///
/// let docs = store.query_documents(Query::by_id(id), "tours").await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> (document_id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        for (id, document) in documents {
            let key = id.to_string();

            if collection_map.entries.contains_key(&key) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }

            let sequence = collection_map.next_sequence;
            collection_map.next_sequence += 1;
            collection_map.entries.insert(key, Entry { sequence, document });
        }

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        for (id, document) in documents {
            let key = id.to_string();

            match collection_map.entries.get_mut(&key) {
                Some(entry) => entry.document = document,
                None => return Err(DocumentStoreError::NotFound(key, collection.to_string())),
            }
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(col) => col,
            None => return Err(DocumentStoreError::CollectionNotFound(collection.to_string())),
        };

        for id in ids {
            collection_map.entries.remove(&id.to_string());
        }

        Ok(())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(col) => col,
            None => return Ok(vec![]),
        };

        let ids = query.ids.as_ref().map(|ids| {
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        });

        let mut documents = collection_map
            .ordered()
            .into_iter()
            .filter(|(key, _)| match &ids {
                Some(ids) => ids.iter().any(|id| id == key),
                None => true,
            })
            .map(|(_, entry)| &entry.document)
            .filter(|document| match &query.filter {
                Some(filter) => DocumentEvaluator::matches(document, filter),
                None => true,
            })
            .collect::<Vec<_>>();

        // Stable, so equal keys keep insertion order.
        documents.sort_by(|a, b| compare_documents(a, b, &query.sort));

        let results = documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match (&query.projection, document) {
                (Some(projection), Bson::Document(fields)) => Bson::Document(projection.apply(fields)),
                (_, document) => document.clone(),
            })
            .collect::<Vec<_>>();

        debug!(collection, returned = results.len(), "query executed");
        Ok(results)
    }

    async fn aggregate_documents(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let documents = {
            let store = self.store.read().await;
            match store.get(collection) {
                Some(col) => col
                    .ordered()
                    .into_iter()
                    .map(|(_, entry)| entry.document.clone())
                    .collect::<Vec<_>>(),
                None => vec![],
            }
        };

        let results = run_pipeline(documents, &pipeline);
        debug!(collection, stages = pipeline.len(), returned = results.len(), "pipeline executed");
        Ok(results)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
