//! Flow registration, composition, resolution and execution.
//!
//! This module provides:
//! - The stage registry and named action table
//! - Anchor-relative flow composition
//! - Dependency resolution into execution plans
//! - The sequential pipeline runner

mod composer;
mod registry;
mod resolver;
mod runner;


pub use composer::{insert_relative, FlowComposer, Insertion, Position};
pub use registry::{ActionTable, StageRegistry};
pub use resolver::{DependencyResolver, ExecutionPlan, PlannedStage};
pub use runner::{PipelineRunner, RunOutcome};
