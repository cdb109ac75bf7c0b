//! Per-stage execution records.

use super::{StageId, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one stage during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageId,
    /// Final status.
    pub status: StageStatus,
    /// Names of the actions that completed, in execution order.
    #[serde(default)]
    pub actions_run: Vec<String>,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    /// Starts a record for a stage that is about to run.
    #[must_use]
    pub fn start(stage: StageId) -> Self {
        let now = Utc::now();
        Self {
            stage,
            status: StageStatus::Running,
            actions_run: Vec::new(),
            started_at: now,
            ended_at: now,
            error: None,
        }
    }

    /// Records a stage that was skipped without running.
    #[must_use]
    pub fn skipped(stage: StageId) -> Self {
        Self {
            status: StageStatus::Skip,
            ..Self::start(stage)
        }
    }

    /// Records a stage left unexecuted after an earlier failure.
    #[must_use]
    pub fn not_run(stage: StageId) -> Self {
        Self {
            status: StageStatus::NotRun,
            ..Self::start(stage)
        }
    }

    /// Marks the record finished with the given status.
    #[must_use]
    pub fn finish(mut self, status: StageStatus) -> Self {
        self.status = status;
        self.ended_at = Utc::now();
        self
    }

    /// Marks the record failed with an error message.
    #[must_use]
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.finish(StageStatus::Fail)
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_microseconds().unwrap_or(0) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> StageId {
        StageId::parse("vivado:write").unwrap()
    }

    #[test]
    fn test_record_finish() {
        let mut record = StageRecord::start(id());
        assert_eq!(record.status, StageStatus::Running);

        record.actions_run.push("make_stamp".to_string());
        let record = record.finish(StageStatus::Ok);
        assert_eq!(record.status, StageStatus::Ok);
        assert!(record.ended_at >= record.started_at);
        assert!(record.duration_ms() >= 0.0);
    }

    #[test]
    fn test_record_fail() {
        let record = StageRecord::start(id()).fail("tool exited with status 1");
        assert_eq!(record.status, StageStatus::Fail);
        assert_eq!(record.error.as_deref(), Some("tool exited with status 1"));
    }

    #[test]
    fn test_record_serialization() {
        let record = StageRecord::skipped(id());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""stage":"vivado:write""#));

        let back: StageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, StageStatus::Skip);
    }
}
