//! Dependency resolution: turn a target stage into a linear plan.

use super::StageRegistry;
use crate::core::StageId;
use crate::errors::{CycleDetectedError, FlowError};
use crate::stages::{SharedAction, StageDescriptor};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// One stage of a resolved plan.
#[derive(Debug, Clone)]
pub struct PlannedStage {
    /// The stage id.
    pub id: StageId,
    /// The descriptor captured at resolve time.
    pub descriptor: Arc<StageDescriptor>,
    /// Materialized actions; `None` for grouping stages.
    pub actions: Option<Vec<SharedAction>>,
}

impl PlannedStage {
    /// Returns the number of actions in this stage.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.as_ref().map_or(0, Vec::len)
    }
}

/// A linear execution order for a target stage.
///
/// Every stage appears once, after every stage it (transitively) requires.
/// The target is always last. Plans own their descriptors, so later
/// re-registrations do not change a plan already resolved.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    target: StageId,
    stages: Vec<PlannedStage>,
}

impl ExecutionPlan {
    /// Returns the target stage.
    #[must_use]
    pub fn target(&self) -> &StageId {
        &self.target
    }

    /// Returns the planned stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    /// Returns the stage ids in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|s| s.id.clone()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the plan has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns true if the plan includes the stage.
    #[must_use]
    pub fn contains(&self, id: &StageId) -> bool {
        self.stages.iter().any(|s| &s.id == id)
    }

    /// Returns every action of the plan, flattened in execution order.
    #[must_use]
    pub fn actions(&self) -> Vec<SharedAction> {
        self.stages
            .iter()
            .filter_map(|s| s.actions.as_ref())
            .flatten()
            .cloned()
            .collect()
    }

    /// Returns the total number of actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.stages.iter().map(PlannedStage::action_count).sum()
    }
}

#[derive(Default)]
struct Walk {
    done: HashSet<StageId>,
    in_progress: HashSet<StageId>,
    path: Vec<StageId>,
    order: Vec<(StageId, Arc<StageDescriptor>)>,
}

/// Expands a target's `requires` into an execution plan.
///
/// Resolution is depth-first and post-order: a stage is emitted once all of
/// its prerequisites are, and prerequisites are visited in declaration
/// order. Nothing is cached between calls.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'a> {
    registry: &'a StageRegistry,
}

impl<'a> DependencyResolver<'a> {
    /// Creates a resolver over a registry.
    #[must_use]
    pub fn new(registry: &'a StageRegistry) -> Self {
        Self { registry }
    }

    /// Resolves a target into a plan.
    ///
    /// Deferred action lists are materialized only after the whole graph has
    /// been walked, so a structural error never invokes a provider.
    ///
    /// # Errors
    ///
    /// - [`FlowError::UnknownStage`] if the target or any prerequisite is
    ///   not registered.
    /// - [`FlowError::CyclicDependency`] naming the cycle if one is
    ///   reachable from the target.
    pub fn resolve(&self, target: &StageId) -> Result<ExecutionPlan, FlowError> {
        let mut walk = Walk::default();
        self.visit(target, None, &mut walk)?;

        let stages: Vec<PlannedStage> = walk
            .order
            .into_iter()
            .map(|(id, descriptor)| PlannedStage {
                actions: descriptor.actions().materialize(),
                id,
                descriptor,
            })
            .collect();

        debug!(
            target = %target,
            order = ?stages.iter().map(|s| s.id.to_string()).collect::<Vec<_>>(),
            "Resolved flow"
        );

        Ok(ExecutionPlan {
            target: target.clone(),
            stages,
        })
    }

    /// Resolves a target to its ordered stage ids.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_order(&self, target: &StageId) -> Result<Vec<StageId>, FlowError> {
        Ok(self.resolve(target)?.ids())
    }

    /// Resolves a qualified `"scope:name"` target.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or resolution fails.
    pub fn resolve_qualified(&self, qualified: &str) -> Result<ExecutionPlan, FlowError> {
        self.resolve(&StageId::parse(qualified)?)
    }

    fn visit(&self, id: &StageId, parent: Option<&StageId>, walk: &mut Walk) -> Result<(), FlowError> {
        if walk.done.contains(id) {
            return Ok(());
        }

        if walk.in_progress.contains(id) {
            let start = walk.path.iter().position(|p| p == id).unwrap_or(0);
            let mut cycle: Vec<StageId> = walk.path[start..].to_vec();
            cycle.push(id.clone());
            return Err(CycleDetectedError::new(cycle).into());
        }

        let descriptor = self.registry.lookup(id).map_err(|err| match parent {
            Some(parent) => err.required_by(parent.clone()),
            None => err,
        })?;

        walk.in_progress.insert(id.clone());
        walk.path.push(id.clone());

        for dep in descriptor.requires() {
            self.visit(dep, Some(id), walk)?;
        }

        walk.path.pop();
        walk.in_progress.remove(id);
        walk.done.insert(id.clone());
        walk.order.push((id.clone(), descriptor));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{NoOpAction, StageActions};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(s: &str) -> StageId {
        StageId::parse(s).unwrap()
    }

    fn ids(list: &[&str]) -> Vec<StageId> {
        list.iter().map(|s| id(s)).collect()
    }

    fn register(registry: &StageRegistry, name: &str, requires: &[&str]) {
        registry
            .register(id(name), StageActions::None, ids(requires))
            .unwrap();
    }

    fn position(order: &[StageId], name: &str) -> usize {
        order.iter().position(|s| s == &id(name)).unwrap()
    }

    #[test]
    fn test_linear_chain() {
        let registry = StageRegistry::new();
        register(&registry, "base:validate", &[]);
        register(&registry, "base:init", &["base:validate"]);
        register(&registry, "base:write", &["base:init"]);

        let order = DependencyResolver::new(&registry)
            .resolve_order(&id("base:write"))
            .unwrap();
        assert_eq!(order, ids(&["base:validate", "base:init", "base:write"]));
    }

    #[test]
    fn test_declaration_order_tie_break() {
        let registry = StageRegistry::new();
        register(&registry, "a:z", &[]);
        register(&registry, "a:m", &[]);
        register(&registry, "a:b", &[]);
        register(&registry, "a:top", &["a:m", "a:z", "a:b"]);

        let order = DependencyResolver::new(&registry)
            .resolve_order(&id("a:top"))
            .unwrap();
        assert_eq!(order, ids(&["a:m", "a:z", "a:b", "a:top"]));
    }

    #[test]
    fn test_diamond_deduplicated() {
        let registry = StageRegistry::new();
        register(&registry, "a:root", &[]);
        register(&registry, "a:left", &["a:root"]);
        register(&registry, "a:right", &["a:root"]);
        register(&registry, "a:top", &["a:left", "a:right"]);

        let order = DependencyResolver::new(&registry)
            .resolve_order(&id("a:top"))
            .unwrap();
        assert_eq!(order, ids(&["a:root", "a:left", "a:right", "a:top"]));
    }

    #[test]
    fn test_every_prerequisite_precedes_dependents() {
        let registry = StageRegistry::new();
        register(&registry, "m:convert", &[]);
        register(&registry, "m:optimize", &["m:convert"]);
        register(&registry, "v:init", &["m:optimize"]);
        register(&registry, "v:stream", &["v:init"]);
        register(&registry, "v:types", &["v:init"]);
        register(&registry, "v:templates", &["v:init"]);
        register(&registry, "v:ip", &["m:optimize", "v:init", "v:stream", "v:types", "v:templates"]);
        register(&registry, "v:write", &["v:ip"]);

        let order = DependencyResolver::new(&registry)
            .resolve_order(&id("v:write"))
            .unwrap();

        assert_eq!(order.len(), 8);
        assert_eq!(order.last(), Some(&id("v:write")));
        for stage in &order {
            for dep in registry.lookup(stage).unwrap().requires() {
                assert!(position(&order, &dep.to_string()) < position(&order, &stage.to_string()));
            }
        }
    }

    #[test]
    fn test_grouping_target_is_last() {
        let registry = StageRegistry::new();
        register(&registry, "a:x", &[]);
        register(&registry, "a:group", &["a:x"]);

        let plan = DependencyResolver::new(&registry).resolve(&id("a:group")).unwrap();
        assert_eq!(plan.target(), &id("a:group"));
        assert_eq!(plan.ids().last(), Some(&id("a:group")));
        assert!(plan.stages().last().unwrap().actions.is_none());
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let registry = StageRegistry::new();
        register(&registry, "a:x", &["a:y"]);
        register(&registry, "a:y", &["a:z"]);
        register(&registry, "a:z", &["a:x"]);
        register(&registry, "a:top", &["a:x"]);

        let err = DependencyResolver::new(&registry)
            .resolve(&id("a:top"))
            .unwrap_err();
        match err {
            FlowError::CyclicDependency(e) => {
                assert_eq!(e.cycle_path, ids(&["a:x", "a:y", "a:z", "a:x"]));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_does_not_invoke_providers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let registry = StageRegistry::new();
        registry
            .register(
                id("a:templates"),
                StageActions::deferred(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    vec![Arc::new(NoOpAction::new("t")) as SharedAction]
                }),
                vec![],
            )
            .unwrap();
        register(&registry, "a:x", &["a:templates", "a:y"]);
        register(&registry, "a:y", &["a:x"]);

        assert!(DependencyResolver::new(&registry).resolve(&id("a:x")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unreachable_cycle_ignored() {
        let registry = StageRegistry::new();
        register(&registry, "a:x", &["a:y"]);
        register(&registry, "a:y", &["a:x"]);
        register(&registry, "a:ok", &[]);

        assert!(DependencyResolver::new(&registry).resolve(&id("a:ok")).is_ok());
    }

    #[test]
    fn test_unknown_prerequisite_names_parent() {
        let registry = StageRegistry::new();
        register(&registry, "vitis:ip", &["vivado:init_layers"]);

        let err = DependencyResolver::new(&registry)
            .resolve(&id("vitis:ip"))
            .unwrap_err();
        match err {
            FlowError::UnknownStage(e) => {
                assert_eq!(e.stage, id("vivado:init_layers"));
                assert_eq!(e.required_by, Some(id("vitis:ip")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_target() {
        let registry = StageRegistry::new();
        let err = DependencyResolver::new(&registry)
            .resolve_qualified("vivado:write")
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownStage(_)));
    }

    #[test]
    fn test_reregistration_reflected_and_old_plan_kept() {
        let registry = StageRegistry::new();
        register(&registry, "a:old", &[]);
        register(&registry, "a:new", &[]);
        register(&registry, "a:top", &["a:old"]);

        let resolver = DependencyResolver::new(&registry);
        let before = resolver.resolve(&id("a:top")).unwrap();

        register(&registry, "a:top", &["a:new"]);
        let after = resolver.resolve(&id("a:top")).unwrap();

        assert_eq!(before.ids(), ids(&["a:old", "a:top"]));
        assert_eq!(after.ids(), ids(&["a:new", "a:top"]));
    }

    #[test]
    fn test_plan_actions_flattened() {
        let registry = StageRegistry::new();
        registry
            .register(
                id("a:x"),
                StageActions::fixed([
                    Arc::new(NoOpAction::new("one")) as SharedAction,
                    Arc::new(NoOpAction::new("two")) as SharedAction,
                ]),
                vec![],
            )
            .unwrap();
        registry
            .register(
                id("a:y"),
                StageActions::fixed([Arc::new(NoOpAction::new("three")) as SharedAction]),
                ids(&["a:x"]),
            )
            .unwrap();

        let plan = DependencyResolver::new(&registry).resolve(&id("a:y")).unwrap();
        let names: Vec<_> = plan.actions().iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
        assert_eq!(plan.action_count(), 3);
        assert!(plan.contains(&id("a:x")));
    }
}
