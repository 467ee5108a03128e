//! The tours collection on top of docgate.
//!
//! [`model::Tour`] is the stored entity, [`hooks::tour_hooks`] wires secret
//! tour filtering, slug derivation and query timing into its collection, and
//! [`service::TourService`] exposes the list, lookup, write and report
//! operations.
//!
//! ```ignore
//! use std::sync::Arc;
//! use docgate::{backend::StoreBackendBuilder, hooks::TracingSink, memory::InMemoryStore, params::QueryParams};
//! use docgate_tours::service::TourService;
//!
//! let service = TourService::with_backend(InMemoryStore::builder().build().await?, Arc::new(TracingSink));
//! let tours = service
//!     .get_all_tours(&QueryParams::parse("difficulty=easy&duration[gte]=5&sort=-price"))
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docgate_tours;

pub mod hooks;
pub mod model;
pub mod reports;
pub mod service;

pub use model::{Difficulty, NewTour, Tour};
pub use service::{TOP_TOURS, TourService};
