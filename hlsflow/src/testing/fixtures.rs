//! Flow graph fixtures.

use std::sync::Arc;

use super::{ActionLog, FailingAction, RecordingAction};
use crate::context::BuildContext;
use crate::core::StageId;
use crate::errors::FlowError;
use crate::pipeline::{DependencyResolver, PipelineRunner, RunOutcome, StageRegistry};
use crate::stages::{SharedAction, StageActions};

/// A registry plus a shared action log.
///
/// Stages added through the fixture run one recording action named after
/// the stage's qualified id, so the log shows the execution order.
#[derive(Debug, Default)]
pub struct FlowFixture {
    /// The registry under test.
    pub registry: StageRegistry,
    /// Log shared by every recording action.
    pub log: ActionLog,
}

impl FlowFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a qualified id.
    ///
    /// # Panics
    ///
    /// Panics if the id is malformed.
    #[must_use]
    pub fn id(qualified: &str) -> StageId {
        StageId::parse(qualified).unwrap_or_else(|e| panic!("bad fixture id {qualified}: {e}"))
    }

    fn ids(list: &[&str]) -> Vec<StageId> {
        list.iter().map(|s| Self::id(s)).collect()
    }

    /// Returns a recording action with the given name.
    #[must_use]
    pub fn recorder(&self, name: &str) -> SharedAction {
        Arc::new(RecordingAction::new(name, self.log.clone()))
    }

    /// Registers a stage that records its own id.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub fn stage(&self, qualified: &str, requires: &[&str]) -> StageId {
        let actions = StageActions::fixed([self.recorder(qualified)]);
        self.registry
            .register(Self::id(qualified), actions, Self::ids(requires))
            .unwrap_or_else(|e| panic!("register {qualified}: {e}"))
    }

    /// Registers a grouping stage with no actions.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub fn grouping(&self, qualified: &str, requires: &[&str]) -> StageId {
        self.registry
            .register(Self::id(qualified), StageActions::None, Self::ids(requires))
            .unwrap_or_else(|e| panic!("register {qualified}: {e}"))
    }

    /// Registers a stage whose only action fails.
    ///
    /// # Panics
    ///
    /// Panics if registration fails.
    pub fn failing(&self, qualified: &str, requires: &[&str]) -> StageId {
        let failing: SharedAction = Arc::new(FailingAction::new(qualified, "fixture failure"));
        self.registry
            .register(Self::id(qualified), StageActions::fixed([failing]), Self::ids(requires))
            .unwrap_or_else(|e| panic!("register {qualified}: {e}"))
    }

    /// Resolves a target to its qualified names.
    ///
    /// # Errors
    ///
    /// Returns any resolve error.
    pub fn order(&self, target: &str) -> Result<Vec<String>, FlowError> {
        Ok(DependencyResolver::new(&self.registry)
            .resolve(&Self::id(target))?
            .ids()
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Runs a target with a default runner and context.
    ///
    /// # Errors
    ///
    /// Returns any resolve error.
    pub async fn run(&self, target: &str) -> Result<RunOutcome, FlowError> {
        let mut ctx = BuildContext::default();
        PipelineRunner::default()
            .run_target(&self.registry, &Self::id(target), &mut ctx)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_records_order() {
        let fx = FlowFixture::new();
        fx.stage("base:validate", &[]);
        fx.stage("base:init", &["base:validate"]);
        fx.grouping("base:all", &["base:init"]);

        let outcome = fx.run("base:all").await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(fx.log.entries(), vec!["base:validate", "base:init"]);
    }
}
