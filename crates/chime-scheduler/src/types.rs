//! Job definitions and execution records.

use chrono::{DateTime, Utc};
use chime_cron::CronExpression;
use serde::{Deserialize, Serialize};

/// Status of one execution attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Scheduled and waiting for its time to arrive.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error (or never became runnable).
    Failed,
    /// Suspended, automatically after repeated failures or by an operator.
    Blocked,
}

impl ExecutionStatus {
    /// Whether this status is final. `Blocked` is not terminal: an operator
    /// retry can revive it.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// One persisted execution attempt (past, present, or future) of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Surrogate key, monotonically increasing per store.
    pub id: u64,
    /// Name of the job this execution belongs to.
    pub job_name: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// When this execution is (or was) scheduled to run.
    pub scheduled_at: DateTime<Utc>,
    /// When execution actually started.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Captured callback output.
    pub output: Option<String>,
    /// Error message, or blocking reason for blocked rows.
    pub error: Option<String>,
    /// Snapshot of the job's metadata at schedule time.
    pub metadata: serde_json::Value,
}

/// Fields for inserting a new execution row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub job_name: String,
    pub status: ExecutionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub metadata: serde_json::Value,
}

/// An in-memory job definition.
///
/// Definitions live for the process lifetime only; the host re-registers
/// every job at startup. Only execution records persist.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Unique job name.
    pub name: String,
    /// Parsed schedule. Falls back to `* * * * *` when the registered
    /// schedule failed validation.
    pub schedule: CronExpression,
    /// The schedule exactly as registered (alias or cron string).
    pub schedule_source: String,
    /// Human-readable description.
    pub description: String,
    /// Inactive jobs stay registered but are never scheduled.
    pub active: bool,
    /// Opaque payload delivered to the callback and stored with each
    /// execution.
    pub metadata: serde_json::Value,
    /// Why this job is excluded from scheduling, if it failed validation.
    pub validation_error: Option<String>,
}

impl JobDefinition {
    /// Whether the scheduler may create executions for this job.
    pub fn is_schedulable(&self) -> bool {
        self.active && self.validation_error.is_none()
    }
}

/// Host-facing registration request.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Unique job name.
    pub name: String,
    /// Cron string or alias ("hourly", "*/5 * * * *", ...).
    pub schedule: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the job starts active.
    pub active: bool,
    /// Metadata passed to the callback on every run. Must be a JSON object
    /// (or null); anything else is a soft validation error.
    pub metadata: serde_json::Value,
}

impl JobSpec {
    /// Create a spec with the given name and schedule.
    pub fn new(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            description: String::new(),
            active: true,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the metadata payload.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Register the job in an inactive state.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Blocked.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutionStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let parsed: ExecutionStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(parsed, ExecutionStatus::Blocked);
    }

    #[test]
    fn spec_builder_defaults() {
        let spec = JobSpec::new("backup", "daily");
        assert!(spec.active);
        assert!(spec.metadata.is_null());

        let spec = JobSpec::new("backup", "daily")
            .with_description("nightly backup")
            .with_metadata(serde_json::json!({"target": "s3"}))
            .inactive();
        assert!(!spec.active);
        assert_eq!(spec.description, "nightly backup");
    }

    #[test]
    fn schedulable_requires_active_and_valid() {
        let mut job = JobDefinition {
            name: "j".to_string(),
            schedule: CronExpression::every_minute(),
            schedule_source: "* * * * *".to_string(),
            description: String::new(),
            active: true,
            metadata: serde_json::Value::Null,
            validation_error: None,
        };
        assert!(job.is_schedulable());

        job.active = false;
        assert!(!job.is_schedulable());

        job.active = true;
        job.validation_error = Some("bad schedule".to_string());
        assert!(!job.is_schedulable());
    }
}
