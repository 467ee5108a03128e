use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, Uuid, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::debug;
use docgate_core::{
    aggregate::Pipeline,
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Query,
};

use crate::query::{filter_document, pipeline_documents, projection_document, sort_document};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

fn unavailable(err: mongodb::error::Error) -> DocumentStoreError {
    DocumentStoreError::StoreUnavailable(err.to_string())
}

/// Position of the first write rejected by a unique index, given the
/// `(position, code)` pairs a write reported.
fn duplicate_position(failures: impl IntoIterator<Item = (usize, i32)>) -> Option<usize> {
    failures
        .into_iter()
        .find(|(_, code)| *code == DUPLICATE_KEY)
        .map(|(position, _)| position)
}

/// Like [`unavailable`], but reports unique index violations the way the
/// in-memory backend does. `ids` are the written documents in write order.
fn write_error(err: mongodb::error::Error, ids: &[Uuid], collection: &str) -> DocumentStoreError {
    let position = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) => duplicate_position([(0, failure.code)]),
        ErrorKind::InsertMany(failure) => duplicate_position(
            failure
                .write_errors
                .iter()
                .flatten()
                .map(|failure| (failure.index, failure.code)),
        ),
        _ => None,
    };

    match position.and_then(|position| ids.get(position)) {
        Some(id) => DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()),
        None => unavailable(err),
    }
}

/// MongoDB-backed document storage.
///
/// Documents are stored with their ID as `_id`; the field is stripped again
/// from query results. Aggregation results are returned as produced, since
/// `_id` there holds the group key.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }

    fn prepare_document(&self, id: &Uuid, document: &Bson) -> DocumentStoreResult<Document> {
        Ok(Document::from_iter(
            document
                .as_document()
                .cloned()
                .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))?
                .into_iter()
                .chain(vec![("_id".to_string(), (*id).into())].into_iter()),
        ))
    }

    fn restore_document(&self, document: Document) -> Bson {
        Bson::Document(Document::from_iter(
            document
                .into_iter()
                .filter(|(k, _)| k != "_id")
        ))
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let ids = documents.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        self.get_collection(collection)
            .insert_many(
                documents
                    .iter()
                    .map(|(id, doc)| self.prepare_document(id, doc))
                    .collect::<DocumentStoreResult<Vec<Document>>>()?,
            )
            .await
            .map_err(|err| write_error(err, &ids, collection))?;

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let handle = self.get_collection(collection);

        for (id, doc) in documents {
            let result = handle
                .replace_one(doc! { "_id": id }, self.prepare_document(&id, &doc)?)
                .await
                .map_err(|err| write_error(err, &[id], collection))?;

            if result.matched_count == 0 {
                return Err(DocumentStoreError::NotFound(id.to_string(), collection.to_string()));
            }
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        if !query.sort.is_empty() {
            options.sort = Some(sort_document(&query.sort));
        }
        if let Some(projection) = query.projection.as_ref().filter(|p| !p.fields().is_empty()) {
            options.projection = Some(projection_document(projection));
        }

        let filter = filter_document(query.filter.as_ref())?;
        let filter = match query.ids {
            Some(ids) => doc! { "$and": [{ "_id": { "$in": ids } }, filter] },
            None => filter,
        };
        debug!(collection, filter = %filter, "running find");

        Ok(
            self.get_collection(collection)
                .find(filter)
                .with_options(options)
                .await
                .map_err(unavailable)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(unavailable)?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn aggregate_documents(&self, pipeline: Pipeline, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let stages = pipeline_documents(&pipeline)?;
        debug!(collection, stages = stages.len(), "running aggregate");

        Ok(
            self.get_collection(collection)
                .aggregate(stages)
                .await
                .map_err(unavailable)?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(unavailable)?
                .into_iter()
                .map(Bson::Document)
                .collect()
        )
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .create_collection(name)
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(unavailable)
    }

    async fn add_unique_index(&self, collection: &str, field: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(
                    IndexOptions::builder()
                    .unique(true)
                    .build()
                )
                .build()
            )
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_failures_point_at_the_rejected_write() {
        assert_eq!(duplicate_position([(0, DUPLICATE_KEY)]), Some(0));
        assert_eq!(duplicate_position([(0, 121), (2, DUPLICATE_KEY)]), Some(2));
        assert_eq!(duplicate_position([(1, 121)]), None);
        assert_eq!(duplicate_position(Vec::new()), None);
    }
}
