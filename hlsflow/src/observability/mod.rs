//! Tracing setup and span helpers.

use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::core::StageId;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "hlsflow=info";

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable, one line per event.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the
/// filter does not parse.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Span covering one run of a plan.
#[must_use]
pub fn run_span(run_id: Uuid, target: &StageId) -> Span {
    tracing::info_span!("flow", run_id = %run_id, target = %target)
}

/// Span covering one stage's actions.
#[must_use]
pub fn stage_span(run_id: Uuid, stage: &StageId) -> Span {
    tracing::debug_span!("stage", run_id = %run_id, stage = %stage)
}
