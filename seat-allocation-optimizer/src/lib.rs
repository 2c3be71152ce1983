//! Deterministic seat allocation.
//!
//! Students are processed by score (highest first) and each one takes the first seat of their
//! ranked preference list that still has room. A seat that was handed out is never taken away
//! again during the same run, so the result only depends on the snapshot of submissions and the
//! seat inventory that were passed in.

extern crate alloc;

mod allocation;
mod inventory;
mod model;
mod validation;

pub use allocation::{allocate, priority_order, Allocation, Outcome, Placement, UnassignedReason};
pub use inventory::{default_layout, InventoryError, Seat, SeatGroup, SeatInventory};
pub use model::{Score, SeatId, Snapshot, Submission};
pub use validation::{check_preferences, SubmissionRequest, ValidationError, MAX_IDENTITY_LENGTH};
