//! Hook wiring for the `tours` collection.

use std::sync::Arc;

use docgate_core::{
    hook::{HookPipeline, OperationPattern},
    hooks::{LogSink, SlugHook, TimingHook, VisibilityHook},
};

/// Flag hiding a tour from every read path.
pub const SECRET_FIELD: &str = "secretTour";

/// Builds the tours pipeline.
///
/// - secret tours are filtered out of finds, updates, deletes and pipelines
/// - the slug of `name` is stored in `slug` on insert
/// - every read is timed and reported to `sink`
pub fn tour_hooks(sink: Arc<dyn LogSink>) -> HookPipeline {
    HookPipeline::builder()
        .pre(OperationPattern::FIND_LIKE, VisibilityHook::new(SECRET_FIELD))
        .pre(OperationPattern::AGGREGATE, VisibilityHook::new(SECRET_FIELD))
        .pre(OperationPattern::INSERT, SlugHook::new("name", "slug"))
        .around(OperationPattern::READS, TimingHook::new(sink))
        .build()
}
