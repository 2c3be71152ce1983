use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use seat_allocation_database::{StudentRecord, SubmissionStore};
use seat_allocation_optimizer::{allocate, Allocation, Seat, SeatInventory, Snapshot, SubmissionRequest};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument};

use crate::error::AppError;

/// Hands out submission timestamps in milliseconds since the unix epoch. Every value is larger
/// than the one before, even if the wall clock stalls or goes backwards.
#[derive(Debug, Default)]
pub struct SubmissionClock {
    last: AtomicI64,
}

impl SubmissionClock {
    pub fn next(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            });
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(previous.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatOccupancy {
    #[serde(flatten)]
    pub seat: Seat,
    pub occupants: Vec<String>,
}

/// Ties the submission store to the seat inventory and the allocation engine.
pub struct SeatService {
    store: Arc<dyn SubmissionStore>,
    inventory: SeatInventory,
    clock: SubmissionClock,
    /// Held for a whole allocation run, and by `reset`, so runs never interleave.
    allocation_lock: Mutex<()>,
    latest: RwLock<Option<Arc<Allocation>>>,
}

impl SeatService {
    pub fn new(store: Arc<dyn SubmissionStore>, inventory: SeatInventory) -> Self {
        Self {
            store,
            inventory,
            clock: SubmissionClock::default(),
            allocation_lock: Mutex::new(()),
            latest: RwLock::new(None),
        }
    }

    pub const fn inventory(&self) -> &SeatInventory {
        &self.inventory
    }

    #[instrument(skip_all, fields(identity = %request.identity))]
    pub async fn submit(&self, request: SubmissionRequest) -> Result<(), AppError> {
        let submission = request.validate(&self.inventory, self.clock.next())?;
        self.store.put(submission).await?;
        info!("accepted submission");
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<Snapshot, AppError> {
        Ok(self.store.snapshot().await?)
    }

    /// Allocates seats for the current snapshot and publishes the result. A request that
    /// arrives during a run waits for it and then runs again on a fresh snapshot.
    ///
    /// Nothing is published if the store fails, the caller may simply retry.
    #[instrument(skip_all)]
    pub async fn allocate(&self) -> Result<Arc<Allocation>, AppError> {
        let _running = self.allocation_lock.lock().await;
        let started = Instant::now();

        let snapshot = self.store.snapshot().await.map_err(|error| {
            error!(%error, "failed to read submissions for allocation");
            AppError::AllocationFailed(error)
        })?;
        let allocation = Arc::new(allocate(&snapshot, &self.inventory));
        self.store.publish(&allocation).await.map_err(|error| {
            error!(%error, "failed to publish allocation");
            AppError::AllocationFailed(error)
        })?;
        *self.latest.write().await = Some(Arc::clone(&allocation));

        info!(
            students = allocation.len(),
            assigned = allocation.assigned(),
            unassigned = allocation.unassigned(),
            elapsed_ms = started.elapsed().as_millis(),
            "published allocation"
        );
        Ok(allocation)
    }

    pub async fn latest_allocation(&self) -> Option<Arc<Allocation>> {
        self.latest.read().await.clone()
    }

    pub async fn students(&self) -> Result<Vec<StudentRecord>, AppError> {
        Ok(self.store.students().await?)
    }

    /// Every seat of the inventory with the students published for it.
    pub async fn seat_map(&self) -> Result<Vec<SeatOccupancy>, AppError> {
        let students = self.store.students().await?;
        Ok(self
            .inventory
            .seats()
            .iter()
            .map(|seat| SeatOccupancy {
                seat: seat.clone(),
                occupants: students
                    .iter()
                    .filter(|student| student.admitted.as_ref() == Some(&seat.id))
                    .map(|student| student.identity.clone())
                    .collect(),
            })
            .collect())
    }

    #[instrument(skip_all)]
    pub async fn reset(&self) -> Result<(), AppError> {
        let _running = self.allocation_lock.lock().await;
        self.store.reset().await?;
        *self.latest.write().await = None;
        info!("removed all submissions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use seat_allocation_database::{DatabaseError, MemoryStore};
    use seat_allocation_optimizer::{SeatId, Submission, ValidationError};

    use super::*;

    fn inventory() -> SeatInventory {
        SeatInventory::new([
            Seat::new("G1R1", 1),
            Seat::new("G2R1", 1),
            Seat::new("G2R2", 1),
        ])
        .unwrap()
    }

    fn request(identity: &str, score: i64, preferences: &[&str]) -> SubmissionRequest {
        SubmissionRequest {
            identity: identity.to_owned(),
            score,
            preferences: preferences.iter().map(|&seat| seat.to_owned()).collect(),
        }
    }

    fn service() -> SeatService {
        SeatService::new(Arc::new(MemoryStore::new()), inventory())
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = SubmissionClock::default();
        let mut previous = clock.next();
        for _ in 0..1000 {
            let next = clock.next();
            assert!(next > previous);
            previous = next;
        }
    }

    #[tokio::test]
    async fn classroom_example() {
        let service = service();
        service.submit(request("Zhang", 98, &["G1R1", "G2R2"])).await.unwrap();
        service.submit(request("Li", 95, &["G1R1", "G2R1"])).await.unwrap();
        service.submit(request("Wang", 92, &["G2R2", "G1R1"])).await.unwrap();

        let allocation = service.allocate().await.unwrap();

        assert_eq!(allocation.seat_of("Zhang").map(SeatId::as_str), Some("G1R1"));
        assert_eq!(allocation.seat_of("Li").map(SeatId::as_str), Some("G2R1"));
        assert_eq!(allocation.seat_of("Wang").map(SeatId::as_str), Some("G2R2"));
        assert_eq!(service.latest_allocation().await, Some(allocation));

        let seat_map = service.seat_map().await.unwrap();
        assert_eq!(seat_map[0].occupants, ["Zhang"]);
        assert_eq!(seat_map[1].occupants, ["Li"]);
        assert_eq!(seat_map[2].occupants, ["Wang"]);
    }

    #[tokio::test]
    async fn rejects_unknown_seat() {
        let service = service();
        let error = service
            .submit(request("Li", 95, &["G9R9"]))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            AppError::Validation(ValidationError::UnknownSeat(_))
        ));
        assert!(service.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let service = service();
        service.submit(request("a", 70, &["G1R1"])).await.unwrap();
        service.submit(request("b", 70, &["G1R1", "G2R1"])).await.unwrap();

        let first = service.allocate().await.unwrap();
        let second = service.allocate().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.seat_of("a").map(SeatId::as_str), Some("G1R1"));
    }

    #[tokio::test]
    async fn reset_forgets_everything() {
        let service = service();
        service.submit(request("a", 70, &["G1R1"])).await.unwrap();
        service.allocate().await.unwrap();
        service.reset().await.unwrap();

        assert!(service.students().await.unwrap().is_empty());
        assert!(service.latest_allocation().await.is_none());
    }

    /// Fails every store operation, like an unreachable database.
    struct UnreachableStore;

    #[async_trait]
    impl SubmissionStore for UnreachableStore {
        async fn put(&self, _submission: Submission) -> Result<(), DatabaseError> {
            Err(DatabaseError::Database(diesel_not_found()))
        }

        async fn snapshot(&self) -> Result<Snapshot, DatabaseError> {
            Err(DatabaseError::Database(diesel_not_found()))
        }

        async fn students(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
            Err(DatabaseError::Database(diesel_not_found()))
        }

        async fn publish(&self, _allocation: &Allocation) -> Result<(), DatabaseError> {
            Err(DatabaseError::Database(diesel_not_found()))
        }

        async fn reset(&self) -> Result<(), DatabaseError> {
            Err(DatabaseError::Database(diesel_not_found()))
        }
    }

    const fn diesel_not_found() -> diesel::result::Error {
        diesel::result::Error::NotFound
    }

    #[tokio::test]
    async fn failed_run_publishes_nothing() {
        let service = SeatService::new(Arc::new(UnreachableStore), inventory());
        let error = service.allocate().await.unwrap_err();
        assert!(matches!(error, AppError::AllocationFailed(_)));
        assert_eq!(error.to_string(), "allocation failed, please retry");
        assert!(service.latest_allocation().await.is_none());
    }

    /// Wraps a memory store and fails the test if two runs overlap between snapshot and
    /// publish.
    #[derive(Default)]
    struct OverlapDetectingStore {
        inner: MemoryStore,
        running: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SubmissionStore for OverlapDetectingStore {
        async fn put(&self, submission: Submission) -> Result<(), DatabaseError> {
            self.inner.put(submission).await
        }

        async fn snapshot(&self) -> Result<Snapshot, DatabaseError> {
            assert_eq!(self.running.fetch_add(1, Ordering::SeqCst), 0);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.inner.snapshot().await
        }

        async fn students(&self) -> Result<Vec<StudentRecord>, DatabaseError> {
            self.inner.students().await
        }

        async fn publish(&self, allocation: &Allocation) -> Result<(), DatabaseError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let result = self.inner.publish(allocation).await;
            self.runs.fetch_add(1, Ordering::SeqCst);
            assert_eq!(self.running.fetch_sub(1, Ordering::SeqCst), 1);
            result
        }

        async fn reset(&self) -> Result<(), DatabaseError> {
            self.inner.reset().await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_runs_are_serialized() {
        let store = Arc::new(OverlapDetectingStore::default());
        let service = Arc::new(SeatService::new(
            Arc::clone(&store) as Arc<dyn SubmissionStore>,
            inventory(),
        ));
        service.submit(request("a", 70, &["G1R1"])).await.unwrap();
        service.submit(request("b", 60, &["G1R1", "G2R2"])).await.unwrap();

        let runs: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.allocate().await })
            })
            .collect();
        let mut results = Vec::new();
        for run in runs {
            results.push(run.await.unwrap().unwrap());
        }

        assert_eq!(store.runs.load(Ordering::SeqCst), 8);
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
