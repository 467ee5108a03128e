//! Built-in hooks: visibility filtering, slug derivation and query timing.

use std::{sync::Arc, time::Duration};

use bson::Bson;
use tracing::info;

use crate::{
    aggregate::Stage,
    error::{DocumentStoreError, DocumentStoreResult},
    hook::{Hook, HookContext, OperationKind, PostHook, PreHook, Target},
    query::Filter,
};

/// Hides every document whose flag field is `true`.
///
/// On queries the clause `field != true` is ANDed into the caller's filter, so
/// a caller asking for `field == true` gets nothing back. On pipelines a
/// `Match` stage with the same clause becomes stage 0. Documents without the
/// field are visible.
#[derive(Debug, Clone)]
pub struct VisibilityHook {
    field: String,
}

impl VisibilityHook {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

impl Hook for VisibilityHook {
    fn name(&self) -> &'static str {
        "visibility"
    }
}

impl PreHook for VisibilityHook {
    fn before(&self, _context: &mut HookContext, target: &mut Target) -> DocumentStoreResult<()> {
        let hidden = Filter::ne(self.field.as_str(), true);

        match target {
            Target::Query(query) => *query = std::mem::take(query).and_filter(hidden),
            Target::Pipeline(pipeline) => pipeline.prepend(Stage::Match(hidden)),
            Target::Document { .. } => {}
        }

        Ok(())
    }
}

/// Stores the slug of a source field into a target field on insert.
#[derive(Debug, Clone)]
pub struct SlugHook {
    source: String,
    target: String,
}

impl SlugHook {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into() }
    }
}

impl Hook for SlugHook {
    fn name(&self) -> &'static str {
        "slug"
    }
}

impl PreHook for SlugHook {
    fn before(&self, _context: &mut HookContext, target: &mut Target) -> DocumentStoreResult<()> {
        let Target::Document { document, .. } = target else {
            return Ok(());
        };

        let failed = |reason: String| DocumentStoreError::HookFailed { hook: "slug", reason };

        let Bson::Document(fields) = document else {
            return Err(failed("document is not an object".to_string()));
        };
        let slug = match fields.get(&self.source) {
            Some(Bson::String(source)) => slugify(source),
            _ => return Err(failed(format!("`{}` is missing or not a string", self.source))),
        };

        fields.insert(self.target.clone(), slug);
        Ok(())
    }
}

/// Lower-case, dash-separated form of `text`.
///
/// ASCII letters and digits are kept, whitespace and separators become a
/// single dash, anything else is dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if (ch.is_whitespace() || matches!(ch, '.' | '_' | '-' | '/' | '\\')) && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Receives timing events from [`TimingHook`]. Fire and forget.
pub trait LogSink: Send + Sync {
    fn record(&self, kind: OperationKind, collection: &str, elapsed: Duration);
}

/// Emits timing events as `tracing` info events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, kind: OperationKind, collection: &str, elapsed: Duration) {
        info!(
            operation = %kind,
            collection,
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "query took {} milliseconds",
            elapsed.as_millis()
        );
    }
}

/// Measures the time between its pre and post phase.
///
/// Register it with [`HookPipelineBuilder::around`](crate::hook::HookPipelineBuilder::around).
#[derive(Clone)]
pub struct TimingHook {
    sink: Arc<dyn LogSink>,
}

impl TimingHook {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl Default for TimingHook {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl Hook for TimingHook {
    fn name(&self) -> &'static str {
        "timing"
    }
}

impl PreHook for TimingHook {
    fn before(&self, context: &mut HookContext, _target: &mut Target) -> DocumentStoreResult<()> {
        context.start_timer();
        Ok(())
    }
}

impl PostHook for TimingHook {
    fn after(&self, context: &HookContext, _results: &[Bson]) -> DocumentStoreResult<()> {
        let elapsed = context.elapsed().unwrap_or_default();
        self.sink
            .record(context.kind(), context.collection(), elapsed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bson::{Uuid, doc};
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        aggregate::Pipeline,
        hook::{HookPipeline, OperationPattern},
        query::{Expr, Query},
    };

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<(OperationKind, String)>>);

    impl LogSink for MemorySink {
        fn record(&self, kind: OperationKind, collection: &str, _elapsed: Duration) {
            self.0
                .lock()
                .unwrap()
                .push((kind, collection.to_string()));
        }
    }

    fn context(kind: OperationKind) -> HookContext {
        HookContext::new(kind, "tours")
    }

    #[test]
    fn visibility_narrows_caller_filter() {
        let mut target = Target::Query(Query::new().with_filter(Filter::eq("secretTour", true)));
        VisibilityHook::new("secretTour")
            .before(&mut context(OperationKind::FindMany), &mut target)
            .unwrap();

        let Target::Query(query) = target else { panic!("expected a query") };
        assert_eq!(
            query.filter,
            Some(Expr::And(vec![Filter::eq("secretTour", true), Filter::ne("secretTour", true)]))
        );
    }

    #[test]
    fn visibility_prepends_match_stage() {
        let mut target = Target::Pipeline(Pipeline::new().with_stage(Stage::Limit(3)));
        VisibilityHook::new("secretTour")
            .before(&mut context(OperationKind::Aggregate), &mut target)
            .unwrap();

        let Target::Pipeline(pipeline) = target else { panic!("expected a pipeline") };
        assert_eq!(
            pipeline.stages(),
            &[Stage::Match(Filter::ne("secretTour", true)), Stage::Limit(3)]
        );
    }

    #[test]
    fn slug_is_derived_from_name() {
        let mut target = Target::Document {
            id: Uuid::new(),
            document: Bson::Document(doc! { "name": "The Forest Hiker" }),
        };
        SlugHook::new("name", "slug")
            .before(&mut context(OperationKind::Insert), &mut target)
            .unwrap();

        let (_, document) = target.into_document().unwrap();
        assert_eq!(
            document.as_document().and_then(|d| d.get_str("slug").ok()),
            Some("the-forest-hiker")
        );
    }

    #[test]
    fn slug_requires_source_field() {
        let mut target = Target::Document { id: Uuid::new(), document: Bson::Document(doc! {}) };
        let err = SlugHook::new("name", "slug")
            .before(&mut context(OperationKind::Insert), &mut target)
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::HookFailed { hook: "slug", .. }));
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  The Snow   Adventurer "), "the-snow-adventurer");
        assert_eq!(slugify("Park Camper's Tour - 2021"), "park-campers-tour-2021");
    }

    #[tokio::test]
    async fn timing_reports_reads_to_sink() {
        let sink = Arc::new(MemorySink::default());
        let pipeline = HookPipeline::builder()
            .around(OperationPattern::READS, TimingHook::new(sink.clone()))
            .build();

        for kind in [OperationKind::FindMany, OperationKind::Aggregate, OperationKind::Insert] {
            let target = match kind {
                OperationKind::Aggregate => Target::Pipeline(Pipeline::new()),
                _ => Target::Query(Query::new()),
            };
            pipeline
                .run(kind, "tours", target, |_| async { Ok(Vec::new()) })
                .await
                .unwrap();
        }

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![
                (OperationKind::FindMany, "tours".to_string()),
                (OperationKind::Aggregate, "tours".to_string()),
            ]
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn tracing_sink_logs_elapsed_time() {
        let pipeline = HookPipeline::builder()
            .around(OperationPattern::READS, TimingHook::default())
            .build();

        pipeline
            .run(OperationKind::FindOne, "tours", Target::Query(Query::new()), |_| async {
                Ok(Vec::new())
            })
            .await
            .unwrap();

        assert!(logs_contain("query took"));
        assert!(logs_contain("operation=findOne"));
    }
}
