//! The execution ledger: durable storage for execution records.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{ExecutionRecord, ExecutionStatus, NewExecution};

/// Errors from ledger storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("execution record not found: {0}")]
    RecordNotFound(u64),
}

/// Durable CRUD for execution records, plus the derived queries the
/// scheduler needs.
///
/// Implementations must assign monotonically increasing ids on insert;
/// "latest" always means highest id.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Insert a new record, assigning its id.
    async fn insert(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError>;

    /// Overwrite an existing record by id.
    async fn update(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    /// Delete a record by id. Deleting a missing record is not an error.
    async fn delete(&self, id: u64) -> Result<(), StoreError>;

    /// The most recent record for a job, by id.
    async fn latest_for_job(&self, job: &str) -> Result<Option<ExecutionRecord>, StoreError>;

    /// The last `limit` terminal (completed/failed) records for a job,
    /// newest first.
    async fn recent_terminal(
        &self,
        job: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// The last `limit` records for a job regardless of status, newest
    /// first.
    async fn history(&self, job: &str, limit: usize) -> Result<Vec<ExecutionRecord>, StoreError>;

    /// Atomically transition the job's latest record from pending to
    /// running, setting `started_at`.
    ///
    /// Returns the claimed record, or `None` if the latest record is absent
    /// or not pending. This single conditional update is the concurrency
    /// guard that keeps two simultaneous runs from both claiming the same
    /// execution.
    async fn claim_running(
        &self,
        job: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionRecord>, StoreError>;
}

/// Ledger contents shared by the built-in stores.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Ledger {
    next_id: u64,
    records: Vec<ExecutionRecord>,
}

impl Ledger {
    fn insert(&mut self, new: NewExecution) -> ExecutionRecord {
        self.next_id += 1;
        let record = ExecutionRecord {
            id: self.next_id,
            job_name: new.job_name,
            status: new.status,
            scheduled_at: new.scheduled_at,
            started_at: new.started_at,
            completed_at: None,
            output: None,
            error: new.error,
            metadata: new.metadata,
        };
        self.records.push(record.clone());
        record
    }

    fn update(&mut self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let slot = self
            .records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(StoreError::RecordNotFound(record.id))?;
        *slot = record.clone();
        Ok(())
    }

    fn delete(&mut self, id: u64) {
        self.records.retain(|r| r.id != id);
    }

    fn latest_for_job(&self, job: &str) -> Option<ExecutionRecord> {
        self.records.iter().rev().find(|r| r.job_name == job).cloned()
    }

    fn recent_terminal(&self, job: &str, limit: usize) -> Vec<ExecutionRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.job_name == job && r.status.is_terminal())
            .take(limit)
            .cloned()
            .collect()
    }

    fn history(&self, job: &str, limit: usize) -> Vec<ExecutionRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.job_name == job)
            .take(limit)
            .cloned()
            .collect()
    }

    fn claim_running(&mut self, job: &str, now: DateTime<Utc>) -> Option<ExecutionRecord> {
        let record = self.records.iter_mut().rev().find(|r| r.job_name == job)?;
        if record.status != ExecutionStatus::Pending {
            return None;
        }
        record.status = ExecutionStatus::Running;
        record.started_at = Some(now);
        Some(record.clone())
    }
}

/// In-process execution store. Used in tests and by hosts that accept
/// losing history on restart.
#[derive(Debug, Default)]
pub struct MemoryExecutionStore {
    ledger: RwLock<Ledger>,
}

impl MemoryExecutionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn insert(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError> {
        Ok(self.ledger.write().await.insert(new))
    }

    async fn update(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.ledger.write().await.update(record)
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        self.ledger.write().await.delete(id);
        Ok(())
    }

    async fn latest_for_job(&self, job: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        Ok(self.ledger.read().await.latest_for_job(job))
    }

    async fn recent_terminal(
        &self,
        job: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.ledger.read().await.recent_terminal(job, limit))
    }

    async fn history(&self, job: &str, limit: usize) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.ledger.read().await.history(job, limit))
    }

    async fn claim_running(
        &self,
        job: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        Ok(self.ledger.write().await.claim_running(job, now))
    }
}

/// File-backed execution store persisting the ledger as one JSON document.
///
/// The whole ledger is rewritten on every mutation; fine at the scale of a
/// single scheduling authority, and records survive process restarts.
#[derive(Debug)]
pub struct FileExecutionStore {
    path: PathBuf,
    ledger: RwLock<Ledger>,
}

impl FileExecutionStore {
    /// Open the ledger at `path`, creating an empty one if absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let ledger = match fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ledger::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = ledger.records.len(), "opened execution ledger");
        Ok(Self {
            path,
            ledger: RwLock::new(ledger),
        })
    }

    async fn persist(&self, ledger: &Ledger) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(ledger)?;
        fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for FileExecutionStore {
    async fn insert(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError> {
        let mut ledger = self.ledger.write().await;
        let record = ledger.insert(new);
        self.persist(&ledger).await?;
        Ok(record)
    }

    async fn update(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.update(record)?;
        self.persist(&ledger).await
    }

    async fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.delete(id);
        self.persist(&ledger).await
    }

    async fn latest_for_job(&self, job: &str) -> Result<Option<ExecutionRecord>, StoreError> {
        Ok(self.ledger.read().await.latest_for_job(job))
    }

    async fn recent_terminal(
        &self,
        job: &str,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.ledger.read().await.recent_terminal(job, limit))
    }

    async fn history(&self, job: &str, limit: usize) -> Result<Vec<ExecutionRecord>, StoreError> {
        Ok(self.ledger.read().await.history(job, limit))
    }

    async fn claim_running(
        &self,
        job: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        let mut ledger = self.ledger.write().await;
        let claimed = ledger.claim_running(job, now);
        if claimed.is_some() {
            self.persist(&ledger).await?;
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn pending(job: &str, h: u32, m: u32) -> NewExecution {
        NewExecution {
            job_name: job.to_string(),
            status: ExecutionStatus::Pending,
            scheduled_at: at(h, m),
            started_at: None,
            error: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn insert_assigns_monotonic_ids() {
        let store = MemoryExecutionStore::new();
        let a = store.insert(pending("a", 1, 0)).await.unwrap();
        let b = store.insert(pending("b", 1, 0)).await.unwrap();
        let c = store.insert(pending("a", 2, 0)).await.unwrap();
        assert!(a.id < b.id && b.id < c.id);
    }

    #[tokio::test]
    async fn latest_for_job_picks_highest_id() {
        let store = MemoryExecutionStore::new();
        store.insert(pending("a", 1, 0)).await.unwrap();
        store.insert(pending("b", 1, 0)).await.unwrap();
        let newest = store.insert(pending("a", 2, 0)).await.unwrap();

        let latest = store.latest_for_job("a").await.unwrap().unwrap();
        assert_eq!(latest.id, newest.id);
        assert!(store.latest_for_job("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_terminal_orders_newest_first_and_skips_non_terminal() {
        let store = MemoryExecutionStore::new();
        for (i, status) in [
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Failed,
            ExecutionStatus::Blocked,
        ]
        .into_iter()
        .enumerate()
        {
            let mut rec = store.insert(pending("a", 1, i as u32)).await.unwrap();
            rec.status = status;
            store.update(&rec).await.unwrap();
        }

        let terminal = store.recent_terminal("a", 10).await.unwrap();
        let statuses: Vec<ExecutionStatus> = terminal.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                ExecutionStatus::Failed,
                ExecutionStatus::Failed,
                ExecutionStatus::Completed,
            ]
        );

        let capped = store.recent_terminal("a", 2).await.unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn claim_running_only_claims_pending() {
        let store = MemoryExecutionStore::new();
        let rec = store.insert(pending("a", 1, 0)).await.unwrap();

        let claimed = store.claim_running("a", at(1, 0)).await.unwrap().unwrap();
        assert_eq!(claimed.id, rec.id);
        assert_eq!(claimed.status, ExecutionStatus::Running);
        assert_eq!(claimed.started_at, Some(at(1, 0)));

        // Second claim finds the row already running.
        assert!(store.claim_running("a", at(1, 1)).await.unwrap().is_none());
        // Claiming a job with no rows is a no-op.
        assert!(store.claim_running("b", at(1, 0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_record_errors() {
        let store = MemoryExecutionStore::new();
        let mut rec = store.insert(pending("a", 1, 0)).await.unwrap();
        store.delete(rec.id).await.unwrap();

        rec.status = ExecutionStatus::Completed;
        let err = store.update(&rec).await.unwrap_err();
        assert!(matches!(err, StoreError::RecordNotFound(_)));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let store = FileExecutionStore::open(&path).await.unwrap();
        let mut rec = store.insert(pending("a", 1, 0)).await.unwrap();
        rec.status = ExecutionStatus::Completed;
        rec.output = Some("done".to_string());
        store.update(&rec).await.unwrap();
        drop(store);

        let reopened = FileExecutionStore::open(&path).await.unwrap();
        let latest = reopened.latest_for_job("a").await.unwrap().unwrap();
        assert_eq!(latest.status, ExecutionStatus::Completed);
        assert_eq!(latest.output.as_deref(), Some("done"));

        // Ids keep increasing after reopen.
        let next = reopened.insert(pending("a", 2, 0)).await.unwrap();
        assert!(next.id > latest.id);
    }

    #[tokio::test]
    async fn file_store_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileExecutionStore::open(dir.path().join("fresh.json"))
            .await
            .unwrap();
        assert!(store.latest_for_job("a").await.unwrap().is_none());
    }
}
