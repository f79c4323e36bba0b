//! Job scheduler: registration, reconciliation, and the run state machine.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use chime_cron::{resolve_alias, CronExpression};

use crate::callback::Callback;
use crate::clock::Clock;
use crate::error::SchedulerError;
use crate::store::ExecutionStore;
use crate::types::{ExecutionRecord, ExecutionStatus, JobDefinition, JobSpec, NewExecution};

/// Tuning knobs for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Consecutive failures at which a job is automatically blocked.
    pub block_threshold: u32,
    /// How many recent terminal executions to inspect when counting
    /// consecutive failures.
    pub failure_window: usize,
    /// Iteration budget for the next-occurrence search.
    pub max_search_iterations: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            block_threshold: 3,
            failure_window: 10,
            max_search_iterations: chime_cron::DEFAULT_MAX_ITERATIONS,
        }
    }
}

struct JobEntry {
    definition: JobDefinition,
    callback: Arc<dyn Callback>,
}

/// The scheduling authority.
///
/// Owns the in-memory job registry and drives the persisted execution
/// ledger. Definitions are rebuilt from host registration calls on every
/// process start; only the ledger survives restarts.
///
/// Ledger invariant: a job has at most one non-terminal (pending, running,
/// or blocked) execution at a time, and an active, valid job always has
/// exactly one upcoming execution unless it is blocked.
pub struct JobScheduler {
    jobs: RwLock<HashMap<String, JobEntry>>,
    store: Arc<dyn ExecutionStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl JobScheduler {
    /// Create a scheduler with default configuration.
    pub fn new(store: Arc<dyn ExecutionStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(store, clock, SchedulerConfig::default())
    }

    /// Create a scheduler with explicit configuration.
    pub fn with_config(
        store: Arc<dyn ExecutionStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            store,
            clock,
            config,
        }
    }

    /// Register a job and schedule its first execution.
    ///
    /// Hard errors (empty name, duplicate name, non-invocable callback)
    /// register nothing. An unparseable schedule or non-object metadata is
    /// a soft error: the job is stored with `validation_error` set and the
    /// fallback schedule, visible to the host but excluded from scheduling
    /// until corrected.
    #[tracing::instrument(skip(self, spec, callback), fields(name = %spec.name))]
    pub async fn register(
        &self,
        spec: JobSpec,
        callback: Arc<dyn Callback>,
    ) -> Result<(), SchedulerError> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(SchedulerError::EmptyName);
        }
        if !callback.is_invocable() {
            return Err(SchedulerError::CallbackNotInvocable(name));
        }

        let mut validation_error = None;

        let resolved = resolve_alias(&spec.schedule);
        let schedule = match CronExpression::parse(resolved) {
            Ok(expr) => expr,
            Err(e) => {
                warn!(schedule = %spec.schedule, error = %e, "schedule failed validation, registering with fallback");
                validation_error = Some(format!("invalid schedule '{}': {e}", spec.schedule));
                CronExpression::every_minute()
            }
        };

        if validation_error.is_none() && !spec.metadata.is_object() && !spec.metadata.is_null() {
            validation_error = Some("metadata must be a JSON object".to_string());
        }

        let definition = JobDefinition {
            name: name.clone(),
            schedule,
            schedule_source: spec.schedule,
            description: spec.description,
            active: spec.active,
            metadata: spec.metadata,
            validation_error,
        };

        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&name) {
                return Err(SchedulerError::DuplicateJob(name));
            }
            jobs.insert(
                name.clone(),
                JobEntry {
                    definition,
                    callback,
                },
            );
        }

        info!(name, "registered job");

        // Surface reconciliation problems without unwinding a registration
        // that already happened.
        if let Err(e) = self.reconcile(&name).await {
            error!(name, error = %e, "reconciliation after registration failed");
        }
        Ok(())
    }

    /// Remove a job definition. The ledger is untouched.
    pub async fn unregister(&self, name: &str) -> Result<(), SchedulerError> {
        let removed = self.jobs.write().await.remove(name);
        match removed {
            Some(_) => {
                info!(name, "unregistered job");
                Ok(())
            }
            None => Err(SchedulerError::JobNotFound(name.to_string())),
        }
    }

    /// All registered job definitions.
    pub async fn jobs(&self) -> Vec<JobDefinition> {
        let mut list: Vec<JobDefinition> = self
            .jobs
            .read()
            .await
            .values()
            .map(|entry| entry.definition.clone())
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// A single job definition by name.
    pub async fn job(&self, name: &str) -> Option<JobDefinition> {
        self.jobs
            .read()
            .await
            .get(name)
            .map(|entry| entry.definition.clone())
    }

    /// Execution history for a job, newest first.
    pub async fn history(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, SchedulerError> {
        Ok(self.store.history(name, limit).await?)
    }

    /// Names of jobs whose pending execution is due at the clock's now,
    /// ordered by scheduled time.
    pub async fn due_jobs(&self) -> Result<Vec<String>, SchedulerError> {
        let now = self.clock.now();
        let names: Vec<String> = {
            let jobs = self.jobs.read().await;
            jobs.values()
                .filter(|entry| entry.definition.is_schedulable())
                .map(|entry| entry.definition.name.clone())
                .collect()
        };

        let mut due = Vec::new();
        for name in names {
            if let Some(record) = self.store.latest_for_job(&name).await?
                && record.status == ExecutionStatus::Pending
                && record.scheduled_at <= now
            {
                due.push((record.scheduled_at, name));
            }
        }
        due.sort();
        Ok(due.into_iter().map(|(_, name)| name).collect())
    }

    /// Restore the ledger invariant for one job.
    ///
    /// Called after every registration and after every run. Deletes stale
    /// pending rows for jobs that must not be scheduled, applies the
    /// consecutive-failure blocking policy, and otherwise ensures exactly
    /// one pending row exists. A failed next-occurrence search is surfaced
    /// and leaves the ledger unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, name: &str) -> Result<(), SchedulerError> {
        let definition = self
            .job(name)
            .await
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;

        let latest = self.store.latest_for_job(name).await?;

        if !definition.is_schedulable() {
            if let Some(record) = latest
                && record.status == ExecutionStatus::Pending
            {
                self.store.delete(record.id).await?;
                debug!(name, id = record.id, "deleted pending execution of unschedulable job");
            }
            return Ok(());
        }

        let recent = self
            .store
            .recent_terminal(name, self.config.failure_window)
            .await?;
        let consecutive_failures = recent
            .iter()
            .take_while(|r| r.status == ExecutionStatus::Failed)
            .count() as u32;

        let now = self.clock.now();

        if consecutive_failures >= self.config.block_threshold {
            let reason = format!("Blocked due to {consecutive_failures} consecutive failures");
            match latest {
                Some(mut record) if !record.status.is_terminal() => {
                    record.status = ExecutionStatus::Blocked;
                    record.error = Some(reason.clone());
                    self.store.update(&record).await?;
                    warn!(name, failures = consecutive_failures, "blocked job execution");
                }
                _ => {
                    let scheduled_at = definition
                        .schedule
                        .next_after_bounded(now, self.config.max_search_iterations)?;
                    self.store
                        .insert(NewExecution {
                            job_name: name.to_string(),
                            status: ExecutionStatus::Blocked,
                            scheduled_at,
                            started_at: None,
                            error: Some(reason),
                            metadata: definition.metadata.clone(),
                        })
                        .await?;
                    warn!(
                        name,
                        failures = consecutive_failures,
                        %scheduled_at,
                        "created blocked execution"
                    );
                }
            }
            return Ok(());
        }

        // One already in flight (or deliberately suspended)? Nothing to do.
        if latest.as_ref().is_some_and(|r| !r.status.is_terminal()) {
            return Ok(());
        }

        let scheduled_at = definition
            .schedule
            .next_after_bounded(now, self.config.max_search_iterations)?;
        self.store
            .insert(NewExecution {
                job_name: name.to_string(),
                status: ExecutionStatus::Pending,
                scheduled_at,
                started_at: None,
                error: None,
                metadata: definition.metadata.clone(),
            })
            .await?;
        debug!(name, %scheduled_at, "scheduled next execution");
        Ok(())
    }

    /// Execute a job's callback now and record the outcome.
    ///
    /// Returns the callback's success or failure; bookkeeping problems after
    /// the callback ran are logged, not returned. Callback errors and panics
    /// never propagate: both become failed executions.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, name: &str) -> Result<bool, SchedulerError> {
        let (definition, callback) = {
            let jobs = self.jobs.read().await;
            let entry = jobs
                .get(name)
                .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
            (entry.definition.clone(), Arc::clone(&entry.callback))
        };

        if !definition.active {
            return Err(SchedulerError::JobInactive(name.to_string()));
        }
        if let Some(reason) = &definition.validation_error {
            return Err(SchedulerError::JobInvalid {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }

        let latest = self.store.latest_for_job(name).await?;
        match latest.as_ref().map(|r| r.status) {
            Some(ExecutionStatus::Running) => {
                return Err(SchedulerError::AlreadyRunning(name.to_string()));
            }
            Some(ExecutionStatus::Blocked) => {
                return Err(SchedulerError::JobBlocked(name.to_string()));
            }
            _ => {}
        }

        let now = self.clock.now();

        // Callbacks can go stale between registration and execution.
        if !callback.is_invocable() {
            let reason = "callback is no longer invocable".to_string();
            match latest {
                Some(mut record) => {
                    record.status = ExecutionStatus::Failed;
                    record.completed_at = Some(now);
                    record.error = Some(reason);
                    self.store.update(&record).await?;
                }
                None => {
                    let mut record = self
                        .store
                        .insert(NewExecution {
                            job_name: name.to_string(),
                            status: ExecutionStatus::Failed,
                            scheduled_at: now,
                            started_at: None,
                            error: Some(reason),
                            metadata: definition.metadata.clone(),
                        })
                        .await?;
                    record.completed_at = Some(now);
                    self.store.update(&record).await?;
                }
            }
            warn!(name, "callback no longer invocable, recorded failed execution");
            return Ok(false);
        }

        // Claim the pending row with a single conditional transition; two
        // simultaneous runs cannot both win it.
        let record = match self.store.claim_running(name, now).await? {
            Some(record) => record,
            None => match self.store.latest_for_job(name).await? {
                // Lost the claim to a concurrent invocation.
                Some(r) if r.status == ExecutionStatus::Running => {
                    return Err(SchedulerError::AlreadyRunning(name.to_string()));
                }
                _ => {
                    // No upcoming row; create one directly in running.
                    self.store
                        .insert(NewExecution {
                            job_name: name.to_string(),
                            status: ExecutionStatus::Running,
                            scheduled_at: now,
                            started_at: Some(now),
                            error: None,
                            metadata: definition.metadata.clone(),
                        })
                        .await?
                }
            },
        };

        info!(name, id = record.id, "executing job");

        // Spawning isolates callback panics; a panicked task surfaces here
        // as a join error instead of unwinding through the scheduler.
        let invocation = {
            let callback = Arc::clone(&callback);
            let metadata = definition.metadata.clone();
            tokio::spawn(async move { callback.invoke(metadata).await })
        };
        let outcome = match invocation.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(format!("callback panicked: {join_error}")),
        };

        let finished_at = self.clock.now();
        let mut record = match self.store.latest_for_job(name).await? {
            Some(latest) => latest,
            None => record,
        };
        record.completed_at = Some(finished_at);
        let succeeded = match outcome {
            Ok(output) => {
                record.status = ExecutionStatus::Completed;
                record.output = Some(output);
                record.error = None;
                true
            }
            Err(error) => {
                record.status = ExecutionStatus::Failed;
                record.error = Some(error);
                false
            }
        };
        self.store.update(&record).await?;

        if succeeded {
            info!(name, id = record.id, "job completed");
        } else {
            warn!(name, id = record.id, error = ?record.error, "job failed");
        }

        if let Err(e) = self.reconcile(name).await {
            error!(name, error = %e, "reconciliation after run failed");
        }

        Ok(succeeded)
    }

    /// Operator action: suspend the job's upcoming or running execution.
    pub async fn block(&self, name: &str, reason: impl Into<String>) -> Result<(), SchedulerError> {
        if self.job(name).await.is_none() {
            return Err(SchedulerError::JobNotFound(name.to_string()));
        }
        let latest = self.store.latest_for_job(name).await?;
        match latest {
            Some(mut record) if !record.status.is_terminal() => {
                record.status = ExecutionStatus::Blocked;
                record.error = Some(reason.into());
                self.store.update(&record).await?;
                info!(name, id = record.id, "manually blocked execution");
                Ok(())
            }
            _ => Err(SchedulerError::NoActiveExecution(name.to_string())),
        }
    }

    /// Operator action: discard a blocked execution and reschedule.
    ///
    /// Reconciliation decides what replaces it; with fewer than the
    /// threshold of recent consecutive failures, a fresh pending row.
    pub async fn retry(&self, name: &str) -> Result<(), SchedulerError> {
        if self.job(name).await.is_none() {
            return Err(SchedulerError::JobNotFound(name.to_string()));
        }
        let latest = self.store.latest_for_job(name).await?;
        match latest {
            Some(record) if record.status == ExecutionStatus::Blocked => {
                self.store.delete(record.id).await?;
                info!(name, id = record.id, "discarded blocked execution for retry");
                self.reconcile(name).await
            }
            _ => Err(SchedulerError::NotBlocked(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::FnCallback;
    use crate::clock::ManualClock;
    use crate::store::MemoryExecutionStore;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn fixture() -> (JobScheduler, Arc<MemoryExecutionStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryExecutionStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
        ));
        let scheduler = JobScheduler::new(
            Arc::clone(&store) as Arc<dyn ExecutionStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (scheduler, store, clock)
    }

    fn ok_callback() -> Arc<dyn Callback> {
        Arc::new(FnCallback::new(|_| async { Ok("ok".to_string()) }))
    }

    #[tokio::test]
    async fn register_rejects_empty_and_duplicate_names() {
        let (scheduler, _, _) = fixture();

        let err = scheduler
            .register(JobSpec::new("  ", "hourly"), ok_callback())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::EmptyName));

        scheduler
            .register(JobSpec::new("ping", "hourly"), ok_callback())
            .await
            .unwrap();
        let err = scheduler
            .register(JobSpec::new("ping", "daily"), ok_callback())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJob(_)));

        // First registration untouched.
        let job = scheduler.job("ping").await.unwrap();
        assert_eq!(job.schedule_source, "hourly");
    }

    #[tokio::test]
    async fn invalid_schedule_registers_softly_with_fallback() {
        let (scheduler, store, _) = fixture();
        scheduler
            .register(JobSpec::new("broken", "not a cron"), ok_callback())
            .await
            .unwrap();

        let job = scheduler.job("broken").await.unwrap();
        let reason = job.validation_error.as_deref().unwrap();
        assert!(reason.contains("not a cron"));
        assert_eq!(job.schedule.to_cron_string(), "* * * * *");

        // Excluded from scheduling: no pending row.
        assert!(store.latest_for_job("broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_object_metadata_is_soft_error() {
        let (scheduler, _, _) = fixture();
        let spec =
            JobSpec::new("odd", "hourly").with_metadata(serde_json::json!([1, 2, 3]));
        scheduler.register(spec, ok_callback()).await.unwrap();

        let job = scheduler.job("odd").await.unwrap();
        assert_eq!(
            job.validation_error.as_deref(),
            Some("metadata must be a JSON object")
        );
    }

    #[tokio::test]
    async fn register_schedules_first_pending_execution() {
        let (scheduler, store, _) = fixture();
        scheduler
            .register(JobSpec::new("ping", "*/5 * * * *"), ok_callback())
            .await
            .unwrap();

        let record = store.latest_for_job("ping").await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Pending);
        assert_eq!(
            record.scheduled_at,
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 5, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn inactive_job_gets_no_execution() {
        let (scheduler, store, _) = fixture();
        scheduler
            .register(JobSpec::new("sleepy", "hourly").inactive(), ok_callback())
            .await
            .unwrap();
        assert!(store.latest_for_job("sleepy").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unregister_leaves_ledger_untouched() {
        let (scheduler, store, _) = fixture();
        scheduler
            .register(JobSpec::new("ping", "hourly"), ok_callback())
            .await
            .unwrap();
        scheduler.unregister("ping").await.unwrap();

        assert!(scheduler.job("ping").await.is_none());
        assert!(store.latest_for_job("ping").await.unwrap().is_some());

        let err = scheduler.unregister("ping").await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn run_rejects_unknown_inactive_and_invalid_jobs() {
        let (scheduler, _, _) = fixture();

        let err = scheduler.run("ghost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound(_)));

        scheduler
            .register(JobSpec::new("sleepy", "hourly").inactive(), ok_callback())
            .await
            .unwrap();
        let err = scheduler.run("sleepy").await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobInactive(_)));

        scheduler
            .register(JobSpec::new("broken", "nope"), ok_callback())
            .await
            .unwrap();
        let err = scheduler.run("broken").await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobInvalid { .. }));
    }

    #[tokio::test]
    async fn due_jobs_orders_by_scheduled_time() {
        let (scheduler, _, clock) = fixture();
        scheduler
            .register(JobSpec::new("hourly-job", "hourly"), ok_callback())
            .await
            .unwrap();
        scheduler
            .register(JobSpec::new("five", "*/5 * * * *"), ok_callback())
            .await
            .unwrap();

        // Nothing due yet.
        assert!(scheduler.due_jobs().await.unwrap().is_empty());

        clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap());
        let due = scheduler.due_jobs().await.unwrap();
        assert_eq!(due, vec!["five".to_string(), "hourly-job".to_string()]);
    }
}
