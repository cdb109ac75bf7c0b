//! Action trait and stage descriptors.
//!
//! Actions are the units of work a stage runs. A stage descriptor pairs an
//! optional action list with the ordered ids of the stages it requires.

mod descriptor;

pub use descriptor::{ActionProvider, StageActions, StageDescriptor};

use crate::context::BuildContext;
use crate::errors::ActionError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for stage actions.
///
/// An action receives the shared build context and reports success or a
/// typed failure. The runner awaits each action to completion before
/// starting the next one.
#[async_trait]
pub trait Action: Send + Sync + Debug {
    /// Returns the name of the action.
    fn name(&self) -> &str;

    /// Runs the action against the build context.
    async fn run(&self, ctx: &mut BuildContext) -> Result<(), ActionError>;
}

/// A shared action handle.
pub type SharedAction = Arc<dyn Action>;

/// A simple function-based action.
pub struct FnAction<F>
where
    F: Fn(&mut BuildContext) -> Result<(), ActionError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnAction<F>
where
    F: Fn(&mut BuildContext) -> Result<(), ActionError> + Send + Sync,
{
    /// Creates a new function-based action.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnAction<F>
where
    F: Fn(&mut BuildContext) -> Result<(), ActionError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&mut BuildContext) -> Result<(), ActionError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut BuildContext) -> Result<(), ActionError> {
        (self.func)(ctx)
    }
}

/// Wraps a closure into a shared action.
pub fn action<F>(name: impl Into<String>, func: F) -> SharedAction
where
    F: Fn(&mut BuildContext) -> Result<(), ActionError> + Send + Sync + 'static,
{
    Arc::new(FnAction::new(name, func))
}

/// A no-op action for testing.
#[derive(Debug, Clone)]
pub struct NoOpAction {
    name: String,
}

impl NoOpAction {
    /// Creates a new no-op action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Action for NoOpAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut BuildContext) -> Result<(), ActionError> {
        Ok(())
    }
}
