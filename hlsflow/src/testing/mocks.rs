//! Mock actions for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::BuildContext;
use crate::errors::ActionError;
use crate::stages::Action;

/// A shared, ordered log of action names.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ActionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns a copy of the entries.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Counts entries equal to `entry`.
    #[must_use]
    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// An action that appends its name to a log.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    name: String,
    log: ActionLog,
}

impl RecordingAction {
    /// Creates a recording action.
    #[must_use]
    pub fn new(name: impl Into<String>, log: ActionLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

#[async_trait]
impl Action for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut BuildContext) -> Result<(), ActionError> {
        self.log.push(self.name.clone());
        Ok(())
    }
}

/// An action that always fails with a rejection.
#[derive(Debug, Clone)]
pub struct FailingAction {
    name: String,
    reason: String,
}

impl FailingAction {
    /// Creates a failing action.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Action for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut BuildContext) -> Result<(), ActionError> {
        Err(ActionError::rejected(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_action() {
        let log = ActionLog::new();
        let act = RecordingAction::new("write_hls", log.clone());
        let mut ctx = BuildContext::default();

        act.run(&mut ctx).await.unwrap();
        act.run(&mut ctx).await.unwrap();

        assert_eq!(log.count("write_hls"), 2);
        log.clear();
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_failing_action() {
        let act = FailingAction::new("validate", "unsupported layer");
        let err = act.run(&mut BuildContext::default()).await.unwrap_err();
        assert!(err.to_string().contains("unsupported layer"));
    }
}
