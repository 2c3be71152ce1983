use alloc::collections::BTreeMap;

use async_trait::async_trait;
use seat_allocation_optimizer::{priority_order, Allocation, SeatId, Snapshot, Submission};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DatabaseError;
use crate::models::StudentRecord;
use crate::SubmissionStore;

struct Entry {
    submission: Submission,
    admitted: Option<SeatId>,
}

/// Keeps all submissions in process memory. Used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn put(&self, submission: Submission) -> Result<(), DatabaseError> {
        debug!(identity = %submission.identity, "storing submission");
        self.entries.write().await.insert(
            submission.identity.clone(),
            Entry {
                submission,
                admitted: None,
            },
        );
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot, DatabaseError> {
        Ok(self
            .entries
            .read()
            .await
            .values()
            .map(|entry| entry.submission.clone())
            .collect())
    }

    async fn students(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
        let entries = self.entries.read().await;
        let mut records: Vec<StudentRecord> = entries
            .values()
            .map(|entry| StudentRecord {
                identity: entry.submission.identity.clone(),
                score: entry.submission.score,
                preferences: entry.submission.preferences.clone(),
                admitted: entry.admitted.clone(),
                submitted_at: entry.submission.submitted_at,
                corrupt: None,
            })
            .collect();
        drop(entries);
        records.sort_by(|left, right| priority_order(&left.submission(), &right.submission()));
        Ok(records)
    }

    async fn publish(&self, allocation: &Allocation) -> Result<(), DatabaseError> {
        let mut entries = self.entries.write().await;
        for entry in entries.values_mut() {
            entry.admitted = allocation
                .outcome(&entry.submission.identity)
                .filter(|outcome| outcome.submitted_at == entry.submission.submitted_at)
                .and_then(|outcome| outcome.placement.seat())
                .cloned();
        }
        Ok(())
    }

    async fn reset(&self) -> Result<(), DatabaseError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
