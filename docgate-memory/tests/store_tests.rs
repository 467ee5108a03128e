//! Tests for the in-memory backend through the `StoreBackend` trait.

use bson::{Bson, Uuid, doc};
use docgate_core::{
    aggregate::{Accumulator, GroupKey, Pipeline, Stage},
    backend::{StoreBackend, StoreBackendBuilder},
    error::DocumentStoreError,
    query::{Filter, Projection, Query, Sort},
};
use docgate_memory::InMemoryStore;

async fn seeded() -> (InMemoryStore, Vec<Uuid>) {
    let store = InMemoryStore::builder().build().await.unwrap();
    let documents = vec![
        doc! { "name": "The Forest Hiker", "difficulty": "easy", "price": 397, "duration": 5 },
        doc! { "name": "The Sea Explorer", "difficulty": "medium", "price": 497, "duration": 7 },
        doc! { "name": "The Snow Adventurer", "difficulty": "difficult", "price": 997, "duration": 4 },
        doc! { "name": "The City Wanderer", "difficulty": "easy", "price": 1197, "duration": 9 },
        doc! { "name": "The Park Camper", "difficulty": "medium", "price": 1497, "duration": 10 },
        doc! { "name": "The Sports Lover", "difficulty": "easy", "price": 397, "duration": 14 },
    ];

    let ids = documents.iter().map(|_| Uuid::new()).collect::<Vec<_>>();
    store
        .insert_documents(
            ids.iter()
                .copied()
                .zip(documents.into_iter().map(Bson::Document))
                .collect(),
            "tours",
        )
        .await
        .unwrap();

    (store, ids)
}

fn names(documents: &[Bson]) -> Vec<&str> {
    documents
        .iter()
        .filter_map(|document| document.as_document()?.get_str("name").ok())
        .collect()
}

#[tokio::test]
async fn test_unsorted_query_keeps_insertion_order() {
    let (store, _) = seeded().await;

    let documents = store.query_documents(Query::new(), "tours").await.unwrap();

    assert_eq!(
        names(&documents),
        vec![
            "The Forest Hiker",
            "The Sea Explorer",
            "The Snow Adventurer",
            "The City Wanderer",
            "The Park Camper",
            "The Sports Lover",
        ]
    );
}

#[tokio::test]
async fn test_filter_sort_and_window() {
    let (store, _) = seeded().await;

    let query = Query::new()
        .with_filter(Filter::and([Filter::eq("difficulty", "easy"), Filter::gte("duration", 5i64)]))
        .with_sort(vec![Sort::desc("price")])
        .with_offset(1)
        .with_limit(1);

    let documents = store.query_documents(query, "tours").await.unwrap();

    assert_eq!(names(&documents), vec!["The Forest Hiker"]);
}

#[tokio::test]
async fn test_equal_sort_keys_keep_insertion_order() {
    let (store, _) = seeded().await;

    let query = Query::new()
        .with_filter(Filter::eq("price", 397i64))
        .with_sort(vec![Sort::asc("price")]);

    let documents = store.query_documents(query, "tours").await.unwrap();

    assert_eq!(names(&documents), vec!["The Forest Hiker", "The Sports Lover"]);
}

#[tokio::test]
async fn test_projection_is_applied_last() {
    let (store, _) = seeded().await;

    let query = Query::new()
        .with_sort(vec![Sort::asc("duration")])
        .with_projection(Projection::include(["name"]))
        .with_limit(1);

    let documents = store.query_documents(query, "tours").await.unwrap();

    assert_eq!(documents, vec![Bson::Document(doc! { "name": "The Snow Adventurer" })]);
}

#[tokio::test]
async fn test_query_by_id_respects_filter() {
    let (store, ids) = seeded().await;

    let found = store
        .query_documents(Query::by_id(ids[1]), "tours")
        .await
        .unwrap();
    assert_eq!(names(&found), vec!["The Sea Explorer"]);

    let filtered = store
        .query_documents(Query::by_id(ids[1]).with_filter(Filter::eq("difficulty", "easy")), "tours")
        .await
        .unwrap();
    assert!(filtered.is_empty());
}

#[tokio::test]
async fn test_duplicate_insert_is_rejected() {
    let (store, ids) = seeded().await;

    let result = store
        .insert_documents(vec![(ids[0], Bson::Document(doc! { "name": "Copy" }))], "tours")
        .await;

    assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));
}

#[tokio::test]
async fn test_update_replaces_and_keeps_position() {
    let (store, ids) = seeded().await;

    store
        .update_documents(vec![(ids[0], Bson::Document(doc! { "name": "The Forest Runner" }))], "tours")
        .await
        .unwrap();

    let documents = store.query_documents(Query::new().with_limit(1), "tours").await.unwrap();
    assert_eq!(names(&documents), vec!["The Forest Runner"]);

    let missing = store
        .update_documents(vec![(Uuid::new(), Bson::Document(doc! {}))], "tours")
        .await;
    assert!(matches!(missing, Err(DocumentStoreError::NotFound(_, _))));
}

#[tokio::test]
async fn test_delete_and_collections() {
    let (store, ids) = seeded().await;

    store.delete_documents(vec![ids[0]], "tours").await.unwrap();
    let remaining = store.query_documents(Query::new(), "tours").await.unwrap();
    assert_eq!(remaining.len(), 5);

    assert_eq!(store.list_collections().await.unwrap(), vec!["tours".to_string()]);
    store.drop_collection("tours").await.unwrap();
    assert!(matches!(
        store.drop_collection("tours").await,
        Err(DocumentStoreError::CollectionNotFound(_))
    ));
}

#[tokio::test]
async fn test_aggregate_groups_in_first_seen_order() {
    let (store, _) = seeded().await;

    let pipeline = Pipeline::new()
        .with_stage(Stage::Match(Filter::lt("price", 1000i64)))
        .with_stage(Stage::group(
            GroupKey::Upper("difficulty".into()),
            [("numTours", Accumulator::Count), ("minPrice", Accumulator::Min("price".into()))],
        ));

    let groups = store.aggregate_documents(pipeline, "tours").await.unwrap();

    assert_eq!(
        groups,
        vec![
            Bson::Document(doc! { "_id": "EASY", "numTours": 2, "minPrice": 397 }),
            Bson::Document(doc! { "_id": "MEDIUM", "numTours": 1, "minPrice": 497 }),
            Bson::Document(doc! { "_id": "DIFFICULT", "numTours": 1, "minPrice": 997 }),
        ]
    );
}

#[tokio::test]
async fn test_missing_collection_is_empty() {
    let store = InMemoryStore::new();

    assert!(store.query_documents(Query::new(), "tours").await.unwrap().is_empty());
    assert!(store.aggregate_documents(Pipeline::new(), "tours").await.unwrap().is_empty());
}
