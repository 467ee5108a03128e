//! Convenient re-exports of commonly used types from docgate.
//!
//! ```ignore
//! use docgate::prelude::*;
//! ```

pub use docgate_core::{
    aggregate::{Accumulator, GroupKey, Pipeline, Stage},
    backend::{StoreBackend, StoreBackendBuilder},
    builder::{Preset, QueryBuilder, QueryDescriptor},
    collection::TypedCollection,
    config::QueryConfig,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    hook::{Hook, HookContext, HookPipeline, OperationKind, OperationPattern, PostHook, PreHook, Target},
    hooks::{LogSink, SlugHook, TimingHook, TracingSink, VisibilityHook},
    page::Pagination,
    params::QueryParams,
    query::{Expr, FieldOp, Filter, Projection, Query, Sort, SortDirection},
    store::{DocumentStore, DocumentStoreBuilder},
};
