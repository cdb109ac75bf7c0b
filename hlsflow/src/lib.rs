//! # hlsflow
//!
//! Stage-graph orchestration for HLS backend builds.
//!
//! A backend declares its build as named stages ("flows") linked by
//! `requires` edges. hlsflow provides:
//!
//! - **Explicit registries**: one [`StageRegistry`](pipeline::StageRegistry) per build session
//! - **Anchor-based composition**: a derived backend extends a base flow by
//!   inserting stages before or after named anchors
//! - **Deterministic resolution**: post-order expansion with cycle detection
//! - **Sequential runs**: stop at the first failing action and report a
//!   partial outcome
//! - **Vivado and Vitis backends** with writers and a tool invocation boundary
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hlsflow::prelude::*;
//!
//! let session = BuildSession::with_default_backends()?;
//! let mut ctx = BuildContext::new(BuildConfig::default(), layers);
//!
//! let outcome = session.write("vitis", &mut ctx).await?;
//! outcome.into_result()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backends;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backends::{
        Backend, BuildOptions, BuildReport, BuildSession, ReportParser, VitisBackend,
        VivadoBackend,
    };
    pub use crate::config::{
        AcceleratorConfig, BuildConfig, IoType, OverridePolicy, RegistryConfig, RunnerConfig,
        Strategy,
    };
    pub use crate::context::{BuildContext, Layer};
    pub use crate::core::{StageId, StageRecord, StageStatus};
    pub use crate::errors::{
        ActionError, AnchorNotFoundError, CycleDetectedError, FlowError, StageActionFailure,
        UnknownStageError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        DependencyResolver, ExecutionPlan, FlowComposer, Insertion, PipelineRunner, RunOutcome,
        StageRegistry,
    };
    pub use crate::stages::{action, Action, SharedAction, StageActions};
    pub use crate::tools::{ProcessToolRunner, ToolInvocation, ToolRunner};
}
