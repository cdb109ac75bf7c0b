//! Testing utilities for hlsflow flows.
//!
//! This module provides:
//! - Recording and failing actions
//! - A registry fixture for building small flow graphs
//! - Assertions over run outcomes and resolved orders

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_precedes, assert_run_failed_at, assert_run_succeeded, assert_stage_status,
};
pub use fixtures::FlowFixture;
pub use mocks::{ActionLog, FailingAction, RecordingAction};
