//! Sequential execution of resolved plans.

use super::{DependencyResolver, ExecutionPlan, StageRegistry};
use crate::config::RunnerConfig;
use crate::context::BuildContext;
use crate::core::{StageId, StageRecord, StageStatus};
use crate::errors::{FlowError, StageActionFailure};
use crate::events::{names, EventSink, NoOpEventSink};
use crate::observability::{run_span, stage_span};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

/// Result of running a plan.
///
/// A failed run is still an outcome: it reports which stages completed,
/// which stage failed and why, and which stages never ran.
#[derive(Debug)]
pub struct RunOutcome {
    /// The build's run id.
    pub run_id: Uuid,
    /// The plan's target.
    pub target: StageId,
    /// One record per planned stage, in plan order.
    pub records: Vec<StageRecord>,
    /// The action failure that stopped the run, if any.
    pub failure: Option<StageActionFailure>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl RunOutcome {
    /// Returns true if no action failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns the stages that ran to completion, in order.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<&StageId> {
        self.records
            .iter()
            .filter(|r| r.status == StageStatus::Ok)
            .map(|r| &r.stage)
            .collect()
    }

    /// Returns the last stage that ran to completion.
    #[must_use]
    pub fn last_completed(&self) -> Option<&StageId> {
        self.records
            .iter()
            .rev()
            .find(|r| r.status == StageStatus::Ok)
            .map(|r| &r.stage)
    }

    /// Returns the stage whose action failed.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&StageId> {
        self.failure.as_ref().map(|f| &f.stage)
    }

    /// Returns the record of a stage.
    #[must_use]
    pub fn record(&self, stage: &StageId) -> Option<&StageRecord> {
        self.records.iter().find(|r| &r.stage == stage)
    }

    /// Returns the names of every action that completed, in order.
    #[must_use]
    pub fn actions_run(&self) -> Vec<&str> {
        self.records
            .iter()
            .flat_map(|r| r.actions_run.iter().map(String::as_str))
            .collect()
    }

    /// Converts a failed outcome into its error.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StageAction`] if an action failed.
    pub fn into_result(self) -> Result<Self, FlowError> {
        match self.failure {
            Some(failure) => Err(failure.into()),
            None => Ok(self),
        }
    }
}

/// Runs resolved plans against a build context.
///
/// Stages run one at a time in plan order, and each action is awaited
/// before the next starts. The first failing action stops the run; effects
/// of earlier actions are kept.
#[derive(Clone)]
pub struct PipelineRunner {
    config: RunnerConfig,
    sink: Arc<dyn EventSink>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Creates a runner that discards events.
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the runner configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Resolves `target` against the registry and runs it.
    ///
    /// Nothing runs if resolution fails.
    ///
    /// # Errors
    ///
    /// Returns any structural error of [`DependencyResolver::resolve`].
    /// Action failures are reported in the outcome, not as an error.
    pub async fn run_target(
        &self,
        registry: &StageRegistry,
        target: &StageId,
        ctx: &mut BuildContext,
    ) -> Result<RunOutcome, FlowError> {
        let plan = DependencyResolver::new(registry).resolve(target)?;
        Ok(self.run(&plan, ctx).await)
    }

    /// Runs a plan.
    pub async fn run(&self, plan: &ExecutionPlan, ctx: &mut BuildContext) -> RunOutcome {
        let span = run_span(ctx.run_id(), plan.target());
        self.run_inner(plan, ctx).instrument(span).await
    }

    async fn run_inner(&self, plan: &ExecutionPlan, ctx: &mut BuildContext) -> RunOutcome {
        let start = Instant::now();
        let run_id = ctx.run_id();
        let target = plan.target().clone();

        info!(run_id = %run_id, target = %target, stages = plan.len(), "Starting flow");
        self.sink
            .emit(
                names::PIPELINE_STARTED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "target": target.to_string(),
                    "stages": plan.ids().iter().map(ToString::to_string).collect::<Vec<_>>(),
                })),
            )
            .await;

        let mut records = Vec::with_capacity(plan.len());

        for (index, stage) in plan.stages().iter().enumerate() {
            if self.config.skip_applied_stages && ctx.has_applied(&stage.id) {
                debug!(run_id = %run_id, stage = %stage.id, "Stage already applied, skipping");
                self.sink
                    .emit(
                        names::STAGE_SKIPPED,
                        Some(json!({
                            "run_id": run_id.to_string(),
                            "stage": stage.id.to_string(),
                            "reason": "already_applied",
                        })),
                    )
                    .await;
                records.push(StageRecord::skipped(stage.id.clone()).finish(StageStatus::Skip));
                continue;
            }

            self.sink
                .emit(
                    names::STAGE_STARTED,
                    Some(json!({
                        "run_id": run_id.to_string(),
                        "stage": stage.id.to_string(),
                        "actions": stage.action_count(),
                    })),
                )
                .await;

            let mut record = StageRecord::start(stage.id.clone());
            let mut failure = None;
            let span = stage_span(run_id, &stage.id);

            for action in stage.actions.iter().flatten() {
                debug!(stage = %stage.id, action = %action.name(), "Running action");
                match action.run(ctx).instrument(span.clone()).await {
                    Ok(()) => record.actions_run.push(action.name().to_string()),
                    Err(err) => {
                        failure = Some(StageActionFailure::new(stage.id.clone(), action.name(), err));
                        break;
                    }
                }
            }

            if let Some(failure) = failure {
                error!(
                    run_id = %run_id,
                    stage = %stage.id,
                    action = %failure.action,
                    error = %failure.source,
                    "Stage failed"
                );
                let record = record.fail(failure.source.to_string());
                self.sink
                    .emit(
                        names::STAGE_FAILED,
                        Some(json!({
                            "run_id": run_id.to_string(),
                            "stage": stage.id.to_string(),
                            "action": &failure.action,
                            "error": &record.error,
                            "duration_ms": record.duration_ms(),
                        })),
                    )
                    .await;
                records.push(record);
                records.extend(
                    plan.stages()[index + 1..]
                        .iter()
                        .map(|rest| StageRecord::not_run(rest.id.clone())),
                );

                let outcome = RunOutcome {
                    run_id,
                    target,
                    records,
                    failure: Some(failure),
                    duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                };
                self.sink
                    .emit(
                        names::PIPELINE_FAILED,
                        Some(json!({
                            "run_id": run_id.to_string(),
                            "target": outcome.target.to_string(),
                            "stage": outcome.failed_stage().map(ToString::to_string),
                            "duration_ms": outcome.duration_ms,
                        })),
                    )
                    .await;
                return outcome;
            }

            let record = record.finish(StageStatus::Ok);
            info!(
                run_id = %run_id,
                stage = %stage.id,
                actions = record.actions_run.len(),
                duration_ms = record.duration_ms(),
                "Stage completed"
            );
            self.sink
                .emit(
                    names::STAGE_COMPLETED,
                    Some(json!({
                        "run_id": run_id.to_string(),
                        "stage": stage.id.to_string(),
                        "actions_run": &record.actions_run,
                        "duration_ms": record.duration_ms(),
                    })),
                )
                .await;
            ctx.mark_applied(stage.id.clone());
            records.push(record);
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(run_id = %run_id, target = %target, duration_ms, "Flow completed");
        self.sink
            .emit(
                names::PIPELINE_COMPLETED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "target": target.to_string(),
                    "duration_ms": duration_ms,
                })),
            )
            .await;

        RunOutcome {
            run_id,
            target,
            records,
            failure: None,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ActionError;
    use crate::events::CollectingEventSink;
    use crate::stages::{action, StageActions};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> StageId {
        StageId::parse(s).unwrap()
    }

    fn push(name: &'static str) -> crate::stages::SharedAction {
        action(name, move |ctx: &mut BuildContext| {
            let mut log = ctx
                .get("log")
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            log.push(json!(name));
            ctx.set("log", json!(log));
            Ok(())
        })
    }

    fn log(ctx: &BuildContext) -> Vec<String> {
        ctx.get("log")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    fn chain() -> StageRegistry {
        let registry = StageRegistry::new();
        registry
            .register(id("a:one"), StageActions::fixed([push("one")]), vec![])
            .unwrap();
        registry
            .register(id("a:two"), StageActions::fixed([push("two"), push("two_b")]), vec![id("a:one")])
            .unwrap();
        registry
            .register(id("a:three"), StageActions::fixed([push("three")]), vec![id("a:two")])
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_runs_in_plan_order() {
        let registry = chain();
        let mut ctx = BuildContext::default();

        let outcome = PipelineRunner::default()
            .run_target(&registry, &id("a:three"), &mut ctx)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(log(&ctx), vec!["one", "two", "two_b", "three"]);
        assert_eq!(outcome.actions_run(), vec!["one", "two", "two_b", "three"]);
        assert_eq!(outcome.last_completed(), Some(&id("a:three")));
        assert_eq!(ctx.applied_stages(), &[id("a:one"), id("a:two"), id("a:three")]);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let registry = chain();
        registry
            .register(
                id("a:two"),
                StageActions::fixed([
                    push("two"),
                    action("boom", |_ctx: &mut BuildContext| Err(ActionError::rejected("unsupported"))),
                    push("never"),
                ]),
                vec![id("a:one")],
            )
            .unwrap();
        let mut ctx = BuildContext::default();

        let outcome = PipelineRunner::default()
            .run_target(&registry, &id("a:three"), &mut ctx)
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(log(&ctx), vec!["one", "two"]);
        assert_eq!(outcome.failed_stage(), Some(&id("a:two")));
        assert_eq!(outcome.last_completed(), Some(&id("a:one")));
        assert_eq!(outcome.failure.as_ref().unwrap().action, "boom");

        let failed = outcome.record(&id("a:two")).unwrap();
        assert_eq!(failed.status, StageStatus::Fail);
        assert_eq!(failed.actions_run, vec!["two"]);
        assert_eq!(outcome.record(&id("a:three")).unwrap().status, StageStatus::NotRun);
        assert!(!ctx.has_applied(&id("a:two")));

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, FlowError::StageAction(_)));
    }

    #[tokio::test]
    async fn test_structural_error_runs_nothing() {
        let registry = chain();
        registry
            .register(id("a:one"), StageActions::fixed([push("one")]), vec![id("a:three")])
            .unwrap();
        let mut ctx = BuildContext::default();

        let err = PipelineRunner::default()
            .run_target(&registry, &id("a:three"), &mut ctx)
            .await
            .unwrap_err();

        assert!(err.is_structural());
        assert!(log(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_skip_applied_stages() {
        let registry = chain();
        let mut ctx = BuildContext::default();
        ctx.mark_applied(id("a:one"));

        let runner = PipelineRunner::new(RunnerConfig::new().with_skip_applied_stages(true));
        let outcome = runner.run_target(&registry, &id("a:three"), &mut ctx).await.unwrap();

        assert_eq!(log(&ctx), vec!["two", "two_b", "three"]);
        assert_eq!(outcome.record(&id("a:one")).unwrap().status, StageStatus::Skip);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let registry = chain();
        let sink = Arc::new(CollectingEventSink::new());
        let runner = PipelineRunner::default().with_event_sink(sink.clone());
        let mut ctx = BuildContext::default();

        runner.run_target(&registry, &id("a:two"), &mut ctx).await.unwrap();

        assert_eq!(
            sink.names(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.completed",
                "pipeline.completed",
            ]
        );
        let run_id = ctx.run_id().to_string();
        for (_, data) in sink.events() {
            assert_eq!(data.unwrap()["run_id"], run_id.as_str());
        }
    }

    #[tokio::test]
    async fn test_failure_events() {
        let registry = StageRegistry::new();
        registry
            .register(
                id("a:bad"),
                StageActions::fixed([action("bad", |_ctx: &mut BuildContext| {
                    Err(ActionError::rejected("no"))
                })]),
                vec![],
            )
            .unwrap();
        let sink = Arc::new(CollectingEventSink::new());
        let mut ctx = BuildContext::default();

        let outcome = PipelineRunner::default()
            .with_event_sink(sink.clone())
            .run_target(&registry, &id("a:bad"), &mut ctx)
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(sink.events_of_type("stage.failed").len(), 1);
        assert_eq!(sink.events_of_type("pipeline.failed").len(), 1);
    }
}
