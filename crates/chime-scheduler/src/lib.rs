//! Cron-driven job scheduling with a persisted execution state machine.
//!
//! Jobs are registered at process start with a name, a schedule (a cron
//! string or alias, parsed by [`chime_cron`]), and an async callback.
//! Every attempt to run a job is an [`ExecutionRecord`] in an
//! [`ExecutionStore`], moving through pending, running, and a terminal
//! completed or failed state; repeated failures block the job until an
//! operator retries it.
//!
//! Definitions live in memory only. The ledger is the durable half: it
//! survives restarts (with [`FileExecutionStore`]) and carries the full
//! execution history.

mod callback;
mod clock;
mod error;
mod scheduler;
mod store;
mod types;

pub use callback::{Callback, CallbackFn, CallbackOutcome, FnCallback};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SchedulerError;
pub use scheduler::{JobScheduler, SchedulerConfig};
pub use store::{ExecutionStore, FileExecutionStore, MemoryExecutionStore, StoreError};
pub use types::{ExecutionRecord, ExecutionStatus, JobDefinition, JobSpec, NewExecution};
