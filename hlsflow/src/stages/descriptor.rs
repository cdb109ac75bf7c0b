//! Stage descriptors.

use super::SharedAction;
use crate::core::StageId;
use std::fmt;
use std::sync::Arc;

/// Computes a stage's action list on demand.
pub type ActionProvider = Arc<dyn Fn() -> Vec<SharedAction> + Send + Sync>;

/// The work attached to a stage.
#[derive(Clone, Default)]
pub enum StageActions {
    /// No actions: the stage only forces its prerequisites to run.
    #[default]
    None,
    /// A fixed, ordered action list.
    Fixed(Vec<SharedAction>),
    /// An action list computed when the stage is resolved.
    Deferred(ActionProvider),
}

impl StageActions {
    /// Creates a fixed action list.
    #[must_use]
    pub fn fixed(actions: impl IntoIterator<Item = SharedAction>) -> Self {
        Self::Fixed(actions.into_iter().collect())
    }

    /// Creates a deferred action list.
    pub fn deferred<F>(provider: F) -> Self
    where
        F: Fn() -> Vec<SharedAction> + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(provider))
    }

    /// Returns true if this is a pure grouping node.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Materializes the action list. `None` for grouping nodes.
    #[must_use]
    pub fn materialize(&self) -> Option<Vec<SharedAction>> {
        match self {
            Self::None => None,
            Self::Fixed(actions) => Some(actions.clone()),
            Self::Deferred(provider) => Some(provider()),
        }
    }
}

impl fmt::Debug for StageActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Fixed(actions) => f
                .debug_tuple("Fixed")
                .field(&actions.iter().map(|a| a.name().to_string()).collect::<Vec<_>>())
                .finish(),
            Self::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

/// A registered stage: its id, its actions, and the stages it requires.
///
/// Descriptors are immutable once registered. The order of `requires` is
/// the tie-break order for otherwise independent prerequisites.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    id: StageId,
    actions: StageActions,
    requires: Vec<StageId>,
}

impl StageDescriptor {
    /// Creates a new stage descriptor.
    #[must_use]
    pub fn new(id: StageId, actions: StageActions, requires: Vec<StageId>) -> Self {
        Self {
            id,
            actions,
            requires,
        }
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &StageId {
        &self.id
    }

    /// Returns the stage's actions.
    #[must_use]
    pub fn actions(&self) -> &StageActions {
        &self.actions
    }

    /// Returns the ordered prerequisite ids.
    #[must_use]
    pub fn requires(&self) -> &[StageId] {
        &self.requires
    }
}
