//! Storage of student submissions.
//!
//! Every store keeps exactly one record per identity. A later `put` for the same identity
//! replaces the record, and a snapshot is always taken as one consistent read.

extern crate alloc;

pub mod error;
mod memory;
pub mod models;
mod postgres;
pub mod schema;

use async_trait::async_trait;
use seat_allocation_optimizer::{Allocation, Snapshot, Submission};

pub use crate::error::DatabaseError;
pub use crate::memory::MemoryStore;
pub use crate::models::StudentRecord;
pub use crate::postgres::{get_database_connection, PgStore};

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Inserts the submission or replaces the one stored for the same identity. A replaced
    /// record loses its published seat.
    async fn put(&self, submission: Submission) -> Result<(), DatabaseError>;

    async fn snapshot(&self) -> Result<Snapshot, DatabaseError>;

    /// All records, highest priority first.
    async fn students(&self) -> Result<Vec<StudentRecord>, DatabaseError>;

    /// Records the seat of every student in `allocation` and clears all other seats, in one
    /// step. Students whose record changed after the snapshot the allocation was computed
    /// from get no seat.
    async fn publish(&self, allocation: &Allocation) -> Result<(), DatabaseError>;

    async fn reset(&self) -> Result<(), DatabaseError>;
}
