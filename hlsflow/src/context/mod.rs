//! Build context management.
//!
//! This module provides:
//! - The mutable context shared by every stage of a build
//! - The layer descriptions stages read and annotate

mod build;
mod layer;

pub use build::BuildContext;
pub use layer::Layer;
