//! Core domain model types for hlsflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Qualified stage identifiers
//! - Stage status enum
//! - Per-stage execution records

mod identifier;
mod record;
mod status;

pub use identifier::{StageId, SCOPE_SEPARATOR};
pub use record::StageRecord;
pub use status::StageStatus;
