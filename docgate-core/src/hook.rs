//! Lifecycle hooks wrapped around every collection operation.
//!
//! A [`HookPipeline`] holds, for each [`OperationKind`], an ordered list of
//! [`PreHook`]s and [`PostHook`]s. Hooks are registered against an
//! [`OperationPattern`] through [`HookPipelineBuilder`] and the per-kind lists
//! are resolved once in [`HookPipelineBuilder::build`]. The pipeline is never
//! mutated afterwards and can be shared freely.
//!
//! Each operation walks through the states of [`OperationState`]:
//!
//! ```text
//! Created -> PreHooksRunning -> Executing -> PostHooksRunning -> Completed
//!                  |                |                |
//!                  +----------------+----------------+--> Failed
//! ```
//!
//! The first hook or store error moves the operation to `Failed`; nothing
//! after it runs.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use bson::{Bson, Uuid};
use tracing::{debug, warn};

use crate::{
    aggregate::Pipeline,
    error::{DocumentStoreError, DocumentStoreResult},
    query::Query,
};

/// The kind of operation a hook is invoked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    FindOne,
    FindMany,
    Update,
    Delete,
    Aggregate,
    Insert,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        OperationKind::FindOne,
        OperationKind::FindMany,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::Aggregate,
        OperationKind::Insert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::FindOne => "findOne",
            OperationKind::FindMany => "find",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Aggregate => "aggregate",
            OperationKind::Insert => "insert",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed set of operation kinds a hook is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPattern(&'static [OperationKind]);

impl OperationPattern {
    /// Every operation that locates documents through a query.
    pub const FIND_LIKE: Self = Self(&[
        OperationKind::FindOne,
        OperationKind::FindMany,
        OperationKind::Update,
        OperationKind::Delete,
    ]);
    pub const AGGREGATE: Self = Self(&[OperationKind::Aggregate]);
    pub const INSERT: Self = Self(&[OperationKind::Insert]);
    /// Find-like operations and aggregations.
    pub const READS: Self = Self(&[
        OperationKind::FindOne,
        OperationKind::FindMany,
        OperationKind::Update,
        OperationKind::Delete,
        OperationKind::Aggregate,
    ]);

    pub const fn only(kinds: &'static [OperationKind]) -> Self {
        Self(kinds)
    }

    pub fn matches(&self, kind: OperationKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn kinds(&self) -> &'static [OperationKind] {
        self.0
    }
}

/// Execution phase of a hook relative to the store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    PreHooksRunning,
    Executing,
    PostHooksRunning,
    Completed,
    Failed,
}

/// Per-operation state shared by the hooks of a single call.
#[derive(Debug)]
pub struct HookContext {
    kind: OperationKind,
    collection: String,
    state: OperationState,
    started_at: Option<Instant>,
}

impl HookContext {
    pub fn new(kind: OperationKind, collection: impl Into<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            state: OperationState::Created,
            started_at: None,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// Records the current instant as the start of the operation.
    pub fn start_timer(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Time since [`start_timer`](Self::start_timer), if it was called.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|started| started.elapsed())
    }

    fn transition(&mut self, next: OperationState) {
        debug!(
            operation = %self.kind,
            collection = %self.collection,
            from = ?self.state,
            to = ?next,
            "operation state changed"
        );
        self.state = next;
    }

    fn fail(&mut self, stage: &str, err: DocumentStoreError) -> DocumentStoreError {
        warn!(
            operation = %self.kind,
            collection = %self.collection,
            stage,
            error = %err,
            "operation failed"
        );
        self.state = OperationState::Failed;
        err
    }
}

/// What a pre-hook may inspect and rewrite before execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Query(Query),
    Pipeline(Pipeline),
    /// A document about to be written.
    Document { id: Uuid, document: Bson },
}

impl Target {
    fn variant(&self) -> &'static str {
        match self {
            Target::Query(_) => "query",
            Target::Pipeline(_) => "pipeline",
            Target::Document { .. } => "document",
        }
    }

    pub fn into_query(self) -> DocumentStoreResult<Query> {
        match self {
            Target::Query(query) => Ok(query),
            other => Err(mismatch("query", &other)),
        }
    }

    pub fn into_pipeline(self) -> DocumentStoreResult<Pipeline> {
        match self {
            Target::Pipeline(pipeline) => Ok(pipeline),
            other => Err(mismatch("pipeline", &other)),
        }
    }

    pub fn into_document(self) -> DocumentStoreResult<(Uuid, Bson)> {
        match self {
            Target::Document { id, document } => Ok((id, document)),
            other => Err(mismatch("document", &other)),
        }
    }
}

fn mismatch(expected: &str, found: &Target) -> DocumentStoreError {
    DocumentStoreError::InvalidDocument(format!("expected a {expected}, found a {}", found.variant()))
}

pub trait Hook: Send + Sync {
    /// Name reported in logs and in [`DocumentStoreError::HookFailed`].
    fn name(&self) -> &'static str;
}

/// Runs before execution and may rewrite the target.
pub trait PreHook: Hook {
    fn before(&self, context: &mut HookContext, target: &mut Target) -> DocumentStoreResult<()>;
}

/// Observes the result of a successful execution. The result is read-only.
pub trait PostHook: Hook {
    fn after(&self, context: &HookContext, results: &[Bson]) -> DocumentStoreResult<()>;
}

type Registry<H> = HashMap<OperationKind, Vec<Arc<H>>>;

/// Ordered pre- and post-hooks per operation kind.
#[derive(Default)]
pub struct HookPipeline {
    pre: Registry<dyn PreHook>,
    post: Registry<dyn PostHook>,
}

impl HookPipeline {
    pub fn builder() -> HookPipelineBuilder {
        HookPipelineBuilder::default()
    }

    /// A pipeline without any hooks.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn pre_hooks(&self, kind: OperationKind) -> &[Arc<dyn PreHook>] {
        self.pre
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn post_hooks(&self, kind: OperationKind) -> &[Arc<dyn PostHook>] {
        self.post
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Names of the hooks that run for `kind` in `phase`, in order.
    pub fn hook_names(&self, kind: OperationKind, phase: Phase) -> Vec<&'static str> {
        match phase {
            Phase::Pre => self
                .pre_hooks(kind)
                .iter()
                .map(|hook| hook.name())
                .collect(),
            Phase::Post => self
                .post_hooks(kind)
                .iter()
                .map(|hook| hook.name())
                .collect(),
        }
    }

    /// Runs one operation through the pipeline with a fresh context.
    pub async fn run<F, Fut>(
        &self,
        kind: OperationKind,
        collection: &str,
        target: Target,
        execute: F,
    ) -> DocumentStoreResult<Vec<Bson>>
    where
        F: FnOnce(Target) -> Fut,
        Fut: Future<Output = DocumentStoreResult<Vec<Bson>>>,
    {
        let mut context = HookContext::new(kind, collection);
        self.run_in(&mut context, target, execute).await
    }

    /// Runs one operation through the pipeline using the caller's context.
    ///
    /// `execute` receives the target as rewritten by the pre-hooks and is
    /// only called once every pre-hook succeeded.
    pub async fn run_in<F, Fut>(
        &self,
        context: &mut HookContext,
        mut target: Target,
        execute: F,
    ) -> DocumentStoreResult<Vec<Bson>>
    where
        F: FnOnce(Target) -> Fut,
        Fut: Future<Output = DocumentStoreResult<Vec<Bson>>>,
    {
        let kind = context.kind();

        context.transition(OperationState::PreHooksRunning);
        for hook in self.pre_hooks(kind) {
            if let Err(err) = hook.before(context, &mut target) {
                return Err(context.fail(hook.name(), err));
            }
        }

        context.transition(OperationState::Executing);
        let results = match execute(target).await {
            Ok(results) => results,
            Err(err) => return Err(context.fail("execute", err)),
        };

        context.transition(OperationState::PostHooksRunning);
        for hook in self.post_hooks(kind) {
            if let Err(err) = hook.after(context, &results) {
                return Err(context.fail(hook.name(), err));
            }
        }

        context.transition(OperationState::Completed);
        Ok(results)
    }
}

impl fmt::Debug for HookPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in OperationKind::ALL {
            map.entry(
                &kind,
                &(self.hook_names(kind, Phase::Pre), self.hook_names(kind, Phase::Post)),
            );
        }
        map.finish()
    }
}

/// Collects hook registrations; registration order is execution order.
#[derive(Default)]
pub struct HookPipelineBuilder {
    pre: Vec<(OperationPattern, Arc<dyn PreHook>)>,
    post: Vec<(OperationPattern, Arc<dyn PostHook>)>,
}

impl HookPipelineBuilder {
    pub fn pre<H: PreHook + 'static>(mut self, pattern: OperationPattern, hook: H) -> Self {
        self.pre.push((pattern, Arc::new(hook)));
        self
    }

    pub fn post<H: PostHook + 'static>(mut self, pattern: OperationPattern, hook: H) -> Self {
        self.post.push((pattern, Arc::new(hook)));
        self
    }

    /// Registers one hook instance in both phases.
    pub fn around<H: PreHook + PostHook + 'static>(mut self, pattern: OperationPattern, hook: H) -> Self {
        let hook = Arc::new(hook);
        self.pre.push((pattern, hook.clone() as Arc<dyn PreHook>));
        self.post.push((pattern, hook as Arc<dyn PostHook>));
        self
    }

    pub fn build(self) -> HookPipeline {
        HookPipeline {
            pre: resolve(&self.pre),
            post: resolve(&self.post),
        }
    }
}

fn resolve<H: ?Sized>(registered: &[(OperationPattern, Arc<H>)]) -> Registry<H> {
    OperationKind::ALL
        .into_iter()
        .map(|kind| {
            let hooks = registered
                .iter()
                .filter(|(pattern, _)| pattern.matches(kind))
                .map(|(_, hook)| Arc::clone(hook))
                .collect();
            (kind, hooks)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::query::Filter;

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Recorder {
        name: &'static str,
        journal: Journal,
    }

    impl Hook for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }
    }

    impl PreHook for Recorder {
        fn before(&self, context: &mut HookContext, _target: &mut Target) -> DocumentStoreResult<()> {
            assert_eq!(context.state(), OperationState::PreHooksRunning);
            self.journal.push(format!("pre:{}", self.name));
            Ok(())
        }
    }

    impl PostHook for Recorder {
        fn after(&self, context: &HookContext, _results: &[Bson]) -> DocumentStoreResult<()> {
            assert_eq!(context.state(), OperationState::PostHooksRunning);
            self.journal.push(format!("post:{}", self.name));
            Ok(())
        }
    }

    struct Failing;

    impl Hook for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    impl PreHook for Failing {
        fn before(&self, _context: &mut HookContext, _target: &mut Target) -> DocumentStoreResult<()> {
            Err(DocumentStoreError::HookFailed { hook: "failing", reason: "refused".into() })
        }
    }

    struct Narrow;

    impl Hook for Narrow {
        fn name(&self) -> &'static str {
            "narrow"
        }
    }

    impl PreHook for Narrow {
        fn before(&self, _context: &mut HookContext, target: &mut Target) -> DocumentStoreResult<()> {
            if let Target::Query(query) = target {
                *query = std::mem::take(query).and_filter(Filter::eq("visible", true));
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, journal: &Journal) -> Recorder {
        Recorder { name, journal: journal.clone() }
    }

    #[test]
    fn patterns_resolve_per_kind() {
        let journal = Journal::default();
        let pipeline = HookPipeline::builder()
            .pre(OperationPattern::FIND_LIKE, recorder("find", &journal))
            .pre(OperationPattern::AGGREGATE, recorder("agg", &journal))
            .around(OperationPattern::READS, recorder("timing", &journal))
            .build();

        assert_eq!(pipeline.hook_names(OperationKind::Update, Phase::Pre), vec!["find", "timing"]);
        assert_eq!(pipeline.hook_names(OperationKind::Aggregate, Phase::Pre), vec!["agg", "timing"]);
        assert_eq!(pipeline.hook_names(OperationKind::Aggregate, Phase::Post), vec!["timing"]);
        assert!(pipeline.hook_names(OperationKind::Insert, Phase::Pre).is_empty());
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order_around_execution() {
        let journal = Journal::default();
        let pipeline = HookPipeline::builder()
            .pre(OperationPattern::FIND_LIKE, recorder("first", &journal))
            .around(OperationPattern::FIND_LIKE, recorder("second", &journal))
            .post(OperationPattern::FIND_LIKE, recorder("third", &journal))
            .build();

        let mut context = HookContext::new(OperationKind::FindMany, "tours");
        let execute_journal = journal.clone();
        let results = pipeline
            .run_in(&mut context, Target::Query(Query::new()), |_| async move {
                execute_journal.push("execute".into());
                Ok(vec![Bson::Int32(1)])
            })
            .await
            .unwrap();

        assert_eq!(results, vec![Bson::Int32(1)]);
        assert_eq!(context.state(), OperationState::Completed);
        assert_eq!(
            journal.entries(),
            vec!["pre:first", "pre:second", "execute", "post:second", "post:third"]
        );
    }

    #[tokio::test]
    async fn pre_hooks_rewrite_the_executed_target() {
        let pipeline = HookPipeline::builder()
            .pre(OperationPattern::FIND_LIKE, Narrow)
            .build();

        pipeline
            .run(OperationKind::FindMany, "tours", Target::Query(Query::new()), |target| async move {
                let query = target.into_query()?;
                assert_eq!(query.filter, Some(Filter::eq("visible", true)));
                Ok(Vec::new())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failing_pre_hook_aborts_before_execution() {
        let journal = Journal::default();
        let pipeline = HookPipeline::builder()
            .pre(OperationPattern::FIND_LIKE, Failing)
            .pre(OperationPattern::FIND_LIKE, recorder("after", &journal))
            .post(OperationPattern::FIND_LIKE, recorder("post", &journal))
            .build();

        let executed = AtomicBool::new(false);
        let mut context = HookContext::new(OperationKind::Delete, "tours");
        let result = pipeline
            .run_in(&mut context, Target::Query(Query::new()), |_| async {
                executed.store(true, Ordering::SeqCst);
                Ok(Vec::new())
            })
            .await;

        assert!(matches!(result, Err(DocumentStoreError::HookFailed { hook: "failing", .. })));
        assert_eq!(context.state(), OperationState::Failed);
        assert!(!executed.load(Ordering::SeqCst));
        assert!(journal.entries().is_empty());
    }

    #[tokio::test]
    async fn store_error_skips_post_hooks() {
        let journal = Journal::default();
        let pipeline = HookPipeline::builder()
            .around(OperationPattern::AGGREGATE, recorder("timing", &journal))
            .build();

        let mut context = HookContext::new(OperationKind::Aggregate, "tours");
        let result = pipeline
            .run_in(&mut context, Target::Pipeline(Pipeline::new()), |_| async {
                Err(DocumentStoreError::StoreUnavailable("connection reset".into()))
            })
            .await;

        assert!(matches!(result, Err(DocumentStoreError::StoreUnavailable(_))));
        assert_eq!(context.state(), OperationState::Failed);
        assert_eq!(journal.entries(), vec!["pre:timing"]);
    }

    #[test]
    fn target_mismatch_is_reported() {
        let err = Target::Pipeline(Pipeline::new()).into_query().unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }
}
