//! Configuration types.
//!
//! - Registry and runner policies
//! - The project configuration consumed by backend stages

mod build;
mod policy;

pub use build::{AcceleratorConfig, BuildConfig, Interface, IoType, Precision, Strategy};
pub use policy::{OverridePolicy, RegistryConfig, RunnerConfig};
