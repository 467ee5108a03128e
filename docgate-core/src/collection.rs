//! Typed access to a single collection.
//!
//! A [`TypedCollection`] is the only way to read or write documents. Every
//! method runs its operation through the collection's
//! [`HookPipeline`], so visibility rules and derived fields apply to every
//! query path: list, by-id lookup, update, delete and aggregation.
//!
//! # Example
//!
//! ```ignore
//! let tours = store.typed_collection::<Tour>();
//!
//! let page = tours.find(&QueryParams::parse("difficulty=easy&sort=-price")).await?;
//! let tour = tours.find_by_id(id).await?;
//! ```

use bson::{Bson, Uuid};
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    aggregate::Pipeline,
    backend::StoreBackend,
    builder::QueryBuilder,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    hook::{HookPipeline, OperationKind, Target},
    params::QueryParams,
    query::{Filter, Query},
};

/// A collection of documents of type `D`, bound to a backend and its hooks.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    name: String,
    backend: &'a B,
    hooks: &'a HookPipeline,
    builder: &'a QueryBuilder,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(
        name: String,
        backend: &'a B,
        hooks: &'a HookPipeline,
        builder: &'a QueryBuilder,
    ) -> Self {
        Self { name, backend, hooks, builder, _marker: PhantomData }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lists documents matching raw client parameters.
    ///
    /// Parameters are translated before any store call, so an invalid
    /// operator or projection fails without I/O. Returned documents are
    /// projected, so they are left as BSON with virtual fields attached.
    pub async fn find(&self, params: &QueryParams) -> DocumentStoreResult<Vec<Bson>> {
        let query = self.builder.build(params)?.into_query();
        debug!(collection = %self.name, params = params.len(), "listing documents");

        let results = self
            .run_query(OperationKind::FindMany, query)
            .await?;

        Ok(results
            .into_iter()
            .map(|mut document| {
                if let Bson::Document(fields) = &mut document {
                    D::apply_virtuals(fields);
                }
                document
            })
            .collect())
    }

    /// Runs an already built query and deserializes every result.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        self.run_query(OperationKind::FindMany, query)
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Fetches one visible document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when no visible document has
    /// this ID.
    pub async fn find_by_id(&self, id: Uuid) -> DocumentStoreResult<D> {
        let results = self
            .run_query(OperationKind::FindOne, Query::by_id(id))
            .await?;

        D::from_bson(self.first(results, &id)?)
    }

    /// Validates and inserts a new document, returning it as stored.
    pub async fn insert(&self, document: D) -> DocumentStoreResult<D> {
        document.validate()?;

        let id = *document.id();
        let target = Target::Document { id, document: document.to_bson()? };

        let results = self
            .hooks
            .run(OperationKind::Insert, &self.name, target, |target| async move {
                let (id, document) = target.into_document()?;
                self.check_unique(&document, None).await?;
                self.backend
                    .insert_documents(vec![(id, document.clone())], &self.name)
                    .await?;
                Ok(vec![document])
            })
            .await?;

        D::from_bson(self.first(results, &id)?)
    }

    /// Merges `changes` into a visible document, re-validates and stores it.
    ///
    /// Fields not named in `changes` keep their stored values; derived fields
    /// are not recomputed.
    pub async fn update_by_id(&self, id: Uuid, changes: bson::Document) -> DocumentStoreResult<D> {
        let target = Target::Query(Query::by_id(id));

        let results = self
            .hooks
            .run(OperationKind::Update, &self.name, target, |target| async move {
                let query = target.into_query()?;
                let current = self.backend.query_documents(query, &self.name).await?;

                let stored = match self.first(current, &id)? {
                    Bson::Document(fields) => fields,
                    other => {
                        return Err(DocumentStoreError::InvalidDocument(format!(
                            "stored document is not an object: {other}"
                        )));
                    }
                };
                let updated = D::from_bson(Bson::Document(merge(&stored, &changes)))
                    .map_err(|err| rejected_change::<D>(&stored, &changes, err))?;
                if *updated.id() != id {
                    return Err(DocumentStoreError::validation("id", "cannot be changed"));
                }
                updated.validate()?;

                let document = updated.to_bson()?;
                self.check_unique(&document, Some(&stored)).await?;
                self.backend
                    .update_documents(vec![(id, document.clone())], &self.name)
                    .await?;
                Ok(vec![document])
            })
            .await?;

        D::from_bson(self.first(results, &id)?)
    }

    /// Deletes a visible document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when no visible document has
    /// this ID; hidden documents are left untouched.
    pub async fn delete_by_id(&self, id: Uuid) -> DocumentStoreResult<()> {
        let target = Target::Query(Query::by_id(id));

        self.hooks
            .run(OperationKind::Delete, &self.name, target, |target| async move {
                let query = target.into_query()?;
                let found = self.backend.query_documents(query, &self.name).await?;
                if found.is_empty() {
                    return Err(self.not_found(&id));
                }

                self.backend
                    .delete_documents(vec![id], &self.name)
                    .await?;
                Ok(found)
            })
            .await?;

        Ok(())
    }

    /// Runs an aggregation pipeline after the pre-hooks had their say.
    pub async fn aggregate(&self, pipeline: Pipeline) -> DocumentStoreResult<Vec<Bson>> {
        debug!(collection = %self.name, stages = pipeline.len(), "aggregating documents");

        self.hooks
            .run(
                OperationKind::Aggregate,
                &self.name,
                Target::Pipeline(pipeline),
                |target| async move {
                    self.backend
                        .aggregate_documents(target.into_pipeline()?, &self.name)
                        .await
                },
            )
            .await
    }

    async fn run_query(&self, kind: OperationKind, query: Query) -> DocumentStoreResult<Vec<Bson>> {
        self.hooks
            .run(kind, &self.name, Target::Query(query), |target| async move {
                self.backend
                    .query_documents(target.into_query()?, &self.name)
                    .await
            })
            .await
    }

    /// Rejects `document` when another stored document already holds the
    /// value of one of its unique fields. Values equal to the `previous`
    /// version of the same document are not checked again.
    ///
    /// Hidden documents count, so the store is queried without hooks.
    async fn check_unique(&self, document: &Bson, previous: Option<&bson::Document>) -> DocumentStoreResult<()> {
        let Bson::Document(fields) = document else {
            return Ok(());
        };

        for field in D::unique_fields() {
            let Some(value) = fields.get(*field) else {
                continue;
            };
            if previous.and_then(|previous| previous.get(*field)) == Some(value) {
                continue;
            }

            let taken = self
                .backend
                .query_documents(
                    Query::new()
                        .with_filter(Filter::eq(*field, value.clone()))
                        .with_limit(1),
                    &self.name,
                )
                .await?;
            if !taken.is_empty() {
                debug!(collection = %self.name, field, "unique value already taken");
                return Err(DocumentStoreError::validation(*field, format!("value {value} is already taken")));
            }
        }

        Ok(())
    }

    fn first(&self, results: Vec<Bson>, id: &Uuid) -> DocumentStoreResult<Bson> {
        results
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(id))
    }

    fn not_found(&self, id: &Uuid) -> DocumentStoreError {
        DocumentStoreError::NotFound(id.to_string(), self.name.clone())
    }
}

fn merge(stored: &bson::Document, changes: &bson::Document) -> bson::Document {
    let mut merged = stored.clone();
    for (field, value) in changes {
        merged.insert(field.clone(), value.clone());
    }
    merged
}

/// Names the change that makes the merged document unreadable as `D`.
///
/// Each change is tried alone against the stored document; the first one
/// that fails is reported. A failure no single change explains is reported
/// as an invalid document.
fn rejected_change<D: Document>(
    stored: &bson::Document,
    changes: &bson::Document,
    err: DocumentStoreError,
) -> DocumentStoreError {
    let reason = match err {
        DocumentStoreError::Serialization(reason) => reason,
        other => other.to_string(),
    };

    changes
        .iter()
        .find(|(field, value)| {
            let single = bson::Document::from_iter([((*field).clone(), (*value).clone())]);
            D::from_bson(Bson::Document(merge(stored, &single))).is_err()
        })
        .map(|(field, _)| DocumentStoreError::validation(field.clone(), format!("has an invalid value: {reason}")))
        .unwrap_or_else(|| DocumentStoreError::InvalidDocument(reason))
}
