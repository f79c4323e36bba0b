//! Error types for the scheduler.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Registration with an empty name.
    #[error("job name cannot be empty")]
    EmptyName,

    /// Registration under a name that is already taken.
    #[error("job already registered: {0}")]
    DuplicateJob(String),

    /// Registration with a callback that cannot be invoked.
    #[error("callback for job '{0}' is not invocable")]
    CallbackNotInvocable(String),

    /// No job registered under this name.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The job is registered but marked inactive.
    #[error("job is not active: {0}")]
    JobInactive(String),

    /// The job carries a validation error and is excluded from scheduling.
    #[error("job '{name}' has a validation error: {reason}")]
    JobInvalid { name: String, reason: String },

    /// The job's latest execution is already running.
    #[error("job is already running: {0}")]
    AlreadyRunning(String),

    /// The job's latest execution is blocked; retry it first.
    #[error("job is blocked: {0}")]
    JobBlocked(String),

    /// No pending or running execution exists to act on.
    #[error("no pending or running execution for job: {0}")]
    NoActiveExecution(String),

    /// The latest execution is not blocked, so there is nothing to retry.
    #[error("no blocked execution to retry for job: {0}")]
    NotBlocked(String),

    /// Schedule evaluation failed (including search exhaustion).
    #[error("schedule error: {0}")]
    Schedule(#[from] chime_cron::CronError),

    /// Ledger storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
