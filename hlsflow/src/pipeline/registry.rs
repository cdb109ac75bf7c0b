//! Stage registry and action table.

use crate::config::{OverridePolicy, RegistryConfig};
use crate::core::StageId;
use crate::errors::{
    CycleDetectedError, DuplicateRegistrationError, FlowError, UnknownActionError,
    UnknownStageError,
};
use crate::stages::{SharedAction, StageActions, StageDescriptor};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Named actions that flows can reference by string.
///
/// Names are checked when a flow is registered, not when it runs.
#[derive(Default)]
pub struct ActionTable {
    actions: RwLock<HashMap<String, SharedAction>>,
}

impl ActionTable {
    /// Creates a new empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under its own name, replacing any previous one.
    pub fn register(&self, action: SharedAction) {
        let name = action.name().to_string();
        if self.actions.write().insert(name.clone(), action).is_some() {
            debug!(action = %name, "Replaced registered action");
        }
    }

    /// Gets an action by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SharedAction> {
        self.actions.read().get(name).cloned()
    }

    /// Checks if an action is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.read().contains_key(name)
    }

    /// Lists registered action names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolves a list of names for `stage`, failing on the first unknown.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownActionError`] naming the first missing action.
    pub fn resolve<S: AsRef<str>>(
        &self,
        stage: &StageId,
        names: &[S],
    ) -> Result<Vec<SharedAction>, UnknownActionError> {
        let actions = self.actions.read();
        names
            .iter()
            .map(|name| {
                actions
                    .get(name.as_ref())
                    .cloned()
                    .ok_or_else(|| UnknownActionError::new(stage.clone(), name.as_ref()))
            })
            .collect()
    }

    /// Clears all registered actions.
    pub fn clear(&self) {
        self.actions.write().clear();
    }
}

impl std::fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTable")
            .field("action_count", &self.actions.read().len())
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    stages: HashMap<StageId, Arc<StageDescriptor>>,
    order: Vec<StageId>,
}

/// Store of stage descriptors for one build session.
///
/// A registry is an explicit object: construct one per session (or
/// [`reset`](Self::reset) it) instead of sharing process-wide state.
/// Lookups are by fully qualified id only. There is no fallback from a
/// derived backend's scope to its base's.
#[derive(Default)]
pub struct StageRegistry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    actions: ActionTable,
}

impl StageRegistry {
    /// Creates a new registry that allows overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the given configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the action table backing named registrations.
    #[must_use]
    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    /// Registers a stage, returning its id for use in later `requires`.
    ///
    /// Re-registering an id replaces the old descriptor when the override
    /// policy allows it. Plans resolved earlier keep the descriptors they
    /// captured.
    ///
    /// # Errors
    ///
    /// - [`FlowError::DuplicateRegistration`] if the id exists and the
    ///   policy is [`OverridePolicy::Forbid`].
    /// - [`FlowError::CyclicDependency`] if the stage requires itself.
    pub fn register(
        &self,
        id: StageId,
        actions: StageActions,
        requires: Vec<StageId>,
    ) -> Result<StageId, FlowError> {
        if requires.contains(&id) {
            return Err(CycleDetectedError::new(vec![id.clone(), id]).into());
        }

        let mut state = self.state.write();
        if state.stages.contains_key(&id) {
            if self.config.override_policy == OverridePolicy::Forbid {
                return Err(DuplicateRegistrationError::new(id).into());
            }
            warn!(stage = %id, "Overriding registered stage");
        } else {
            state.order.push(id.clone());
        }

        debug!(
            stage = %id,
            requires = ?requires.iter().map(ToString::to_string).collect::<Vec<_>>(),
            grouping = actions.is_none(),
            "Registered stage"
        );

        let descriptor = StageDescriptor::new(id.clone(), actions, requires);
        state.stages.insert(id.clone(), Arc::new(descriptor));
        Ok(id)
    }

    /// Registers a stage named `scope:name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed or registration fails.
    pub fn register_flow(
        &self,
        scope: &str,
        name: &str,
        actions: StageActions,
        requires: Vec<StageId>,
    ) -> Result<StageId, FlowError> {
        self.register(StageId::new(scope, name)?, actions, requires)
    }

    /// Registers a stage whose actions are named entries of the action table.
    ///
    /// Every name must already be in the table.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownAction`] for the first unknown name, or
    /// any error of [`register`](Self::register).
    pub fn register_named<S: AsRef<str>>(
        &self,
        id: StageId,
        action_names: &[S],
        requires: Vec<StageId>,
    ) -> Result<StageId, FlowError> {
        let actions = self.actions.resolve(&id, action_names)?;
        self.register(id, StageActions::Fixed(actions), requires)
    }

    /// Looks up a stage by id.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownStageError`] if the id is not registered.
    pub fn lookup(&self, id: &StageId) -> Result<Arc<StageDescriptor>, UnknownStageError> {
        self.state
            .read()
            .stages
            .get(id)
            .cloned()
            .ok_or_else(|| UnknownStageError::new(id.clone()))
    }

    /// Looks up a stage by its qualified `"scope:name"` string.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is malformed or not registered.
    pub fn lookup_qualified(&self, qualified: &str) -> Result<Arc<StageDescriptor>, FlowError> {
        let id = StageId::parse(qualified)?;
        Ok(self.lookup(&id)?)
    }

    /// Checks if a stage is registered.
    #[must_use]
    pub fn contains(&self, id: &StageId) -> bool {
        self.state.read().stages.contains_key(id)
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().stages.len()
    }

    /// Returns true if no stages are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().stages.is_empty()
    }

    /// Lists stage ids in first-registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<StageId> {
        self.state.read().order.clone()
    }

    /// Lists the stages registered under a scope, in registration order.
    #[must_use]
    pub fn flows_in_scope(&self, scope: &str) -> Vec<StageId> {
        self.state
            .read()
            .order
            .iter()
            .filter(|id| id.scope() == scope)
            .cloned()
            .collect()
    }

    /// Removes every stage and action.
    pub fn reset(&self) {
        let mut state = self.state.write();
        state.stages.clear();
        state.order.clear();
        self.actions.clear();
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("config", &self.config)
            .field("stage_count", &self.len())
            .field("actions", &self.actions)
            .finish()
    }
}
