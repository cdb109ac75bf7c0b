//! Test assertions for run outcomes and resolved orders.

use crate::core::{StageId, StageStatus};
use crate::pipeline::RunOutcome;

/// Asserts that no action failed.
pub fn assert_run_succeeded(outcome: &RunOutcome) {
    assert!(
        outcome.is_success(),
        "Expected success, got failure: {:?}",
        outcome.failure.as_ref().map(ToString::to_string)
    );
}

/// Asserts that the run stopped at `stage`.
pub fn assert_run_failed_at(outcome: &RunOutcome, stage: &StageId) {
    assert_eq!(
        outcome.failed_stage(),
        Some(stage),
        "Expected failure at {stage}, got {:?}",
        outcome.failed_stage()
    );
}

/// Asserts the recorded status of one stage.
pub fn assert_stage_status(outcome: &RunOutcome, stage: &StageId, expected: StageStatus) {
    let actual = outcome.record(stage).map(|r| r.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected {stage} to be {expected:?}, got {actual:?}"
    );
}

/// Asserts that `before` appears earlier than `after` in `order`.
pub fn assert_precedes<S: AsRef<str>>(order: &[S], before: &str, after: &str) {
    let pos = |name: &str| order.iter().position(|s| s.as_ref() == name);
    match (pos(before), pos(after)) {
        (Some(a), Some(b)) => assert!(a < b, "Expected {before} before {after}"),
        (a, b) => panic!("Missing from order: {before}={a:?}, {after}={b:?}"),
    }
}
