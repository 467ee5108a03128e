//! Main docgate crate providing a unified interface for hooked document access.
//!
//! This crate is the primary entry point for users of the docgate project.
//! It re-exports the core types from the sub-crates and provides access to the
//! storage backends.
//!
//! # Features
//!
//! - **Query translation** - Raw client parameters become filters, sort keys, projections and pages
//! - **Lifecycle hooks** - Visibility, derived fields and timing applied to every operation
//! - **Aggregation** - Typed pipelines that pass through the same hooks as queries
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docgate::{prelude::*, memory::InMemoryStore};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! pub struct Article {
//!     pub id: Uuid,
//!     pub title: String,
//!     pub hidden: bool,
//! }
//!
//! impl Document for Article {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn collection_name() -> &'static str { "articles" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let hooks = HookPipeline::builder()
//!         .pre(OperationPattern::FIND_LIKE, VisibilityHook::new("hidden"))
//!         .around(OperationPattern::READS, TimingHook::new(Arc::new(TracingSink)))
//!         .build();
//!
//!     let store = DocumentStore::builder(InMemoryStore::builder().build().await?)
//!         .with_hooks::<Article>(hooks)
//!         .build();
//!     let articles = store.typed_collection::<Article>();
//!
//!     articles
//!         .insert(Article { id: Uuid::new(), title: "Hello".into(), hidden: false })
//!         .await?;
//!
//!     let page = articles
//!         .find(&QueryParams::parse("sort=title&fields=title&limit=10"))
//!         .await?;
//!     println!("{page:?}");
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docgate_core::{
    aggregate, backend, builder, collection, config, document, error, hook, hooks, page, params, query,
    store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docgate_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docgate_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
