//! Query translation and hooked document access over pluggable stores.
//!
//! This crate is the core of the docgate project and provides:
//!
//! - **Query parameters** ([`params`]) - Raw, ordered client parameters
//! - **Query builder** ([`builder`]) - Pure translation of parameters into a query descriptor
//! - **Query model** ([`query`]) - Filter expressions, sort keys, projections
//! - **Aggregation** ([`aggregate`]) - Typed aggregation pipeline stages
//! - **Hooks** ([`hook`], [`hooks`]) - Pre/post interceptors around every operation
//! - **Documents** ([`document`]) - Traits for stored entities
//! - **Store backend abstraction** ([`backend`]) - The capability a store client provides
//! - **Document store** ([`store`], [`collection`]) - The only entry point to stored documents
//! - **Configuration** ([`config`]) - Query defaults
//! - **Error handling** ([`error`]) - One error type for every failure path
//!
//! # Example
//!
//! ```ignore
//! use docgate::{Document, DocumentStore, QueryParams};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Tour {
//!     pub id: Uuid,
//!     pub name: String,
//! }
//!
//! impl Document for Tour {
//!     fn id(&self) -> &Uuid {
//!         &self.id
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "tours"
//!     }
//! }
//!
//! let store = DocumentStore::new(backend);
//! let tours = store
//!     .typed_collection::<Tour>()
//!     .find(&QueryParams::parse("sort=-price&limit=5"))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_core;

pub mod aggregate;
pub mod backend;
pub mod builder;
pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod hook;
pub mod hooks;
pub mod page;
pub mod params;
pub mod query;
pub mod store;
