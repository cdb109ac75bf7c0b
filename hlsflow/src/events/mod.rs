//! Event sinks for build lifecycle events.
//!
//! The runner holds an explicit `Arc<dyn EventSink>`; there is no
//! process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Lifecycle event names emitted by the runner.
pub mod names {
    /// A plan started running.
    pub const PIPELINE_STARTED: &str = "pipeline.started";
    /// Every stage of a plan succeeded or was skipped.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// A plan stopped on a failed action.
    pub const PIPELINE_FAILED: &str = "pipeline.failed";
    /// A stage started running its actions.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage ran all its actions.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage was skipped because it was already applied.
    pub const STAGE_SKIPPED: &str = "stage.skipped";
    /// A stage action failed.
    pub const STAGE_FAILED: &str = "stage.failed";
}
