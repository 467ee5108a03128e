//! Tour operations as exposed to the HTTP layer.

use std::sync::Arc;

use bson::{Bson, DateTime, Uuid};
use tracing::debug;

use docgate_core::{
    backend::StoreBackend,
    builder::Preset,
    collection::TypedCollection,
    error::DocumentStoreResult,
    hooks::LogSink,
    params::QueryParams,
    store::DocumentStore,
};

use crate::{
    hooks::tour_hooks,
    model::{NewTour, Tour, trim_changes},
    reports::{self, STATS_MIN_RATING},
};

/// The five best rated tours, cheapest first on equal ratings.
pub const TOP_TOURS: Preset = Preset::top_n(
    5,
    "-ratingsAverage,price",
    "name,price,ratingsAverage,summary,difficulty",
);

#[derive(Debug)]
pub struct TourService<B: StoreBackend> {
    store: DocumentStore<B>,
}

impl<B: StoreBackend> TourService<B> {
    /// Wraps a store that already has the tour hooks registered.
    pub fn new(store: DocumentStore<B>) -> Self {
        Self { store }
    }

    /// Builds a store over `backend` with the tour hooks and default query
    /// settings.
    pub fn with_backend(backend: B, sink: Arc<dyn LogSink>) -> Self {
        Self::new(
            DocumentStore::builder(backend)
                .with_hooks::<Tour>(tour_hooks(sink))
                .build(),
        )
    }

    pub fn store(&self) -> &DocumentStore<B> {
        &self.store
    }

    /// Creates the unique indexes tours rely on. Backends without index
    /// support ignore this; names are still checked before every write.
    pub async fn ensure_indexes(&self) -> DocumentStoreResult<()> {
        self.store.ensure_unique_indexes::<Tour>().await
    }

    fn tours(&self) -> TypedCollection<'_, B, Tour> {
        self.store.typed_collection::<Tour>()
    }

    pub async fn get_all_tours(&self, params: &QueryParams) -> DocumentStoreResult<Vec<Bson>> {
        self.tours().find(params).await
    }

    /// Lists tours through [`TOP_TOURS`]. Filter parameters still apply.
    pub async fn top_tours(&self, params: QueryParams) -> DocumentStoreResult<Vec<Bson>> {
        self.tours().find(&TOP_TOURS.apply(params)).await
    }

    pub async fn get_tour(&self, id: Uuid) -> DocumentStoreResult<Tour> {
        self.tours().find_by_id(id).await
    }

    pub async fn create_tour(&self, tour: NewTour) -> DocumentStoreResult<Tour> {
        let tour = tour.into_tour(Uuid::new(), DateTime::now());
        debug!(id = %tour.id, name = %tour.name, "creating tour");

        self.tours().insert(tour).await
    }

    /// Applies `changes` to a tour. The slug keeps its original value.
    pub async fn update_tour(&self, id: Uuid, changes: bson::Document) -> DocumentStoreResult<Tour> {
        self.tours()
            .update_by_id(id, trim_changes(changes))
            .await
    }

    pub async fn delete_tour(&self, id: Uuid) -> DocumentStoreResult<()> {
        self.tours().delete_by_id(id).await
    }

    pub async fn tour_stats(&self) -> DocumentStoreResult<Vec<Bson>> {
        self.tours()
            .aggregate(reports::tour_stats(STATS_MIN_RATING))
            .await
    }

    pub async fn monthly_plan(&self, year: i32) -> DocumentStoreResult<Vec<Bson>> {
        self.tours()
            .aggregate(reports::monthly_plan(year)?)
            .await
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.store.shutdown().await
    }
}
