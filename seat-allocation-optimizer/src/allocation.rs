use alloc::collections::BTreeMap;
use core::cmp::Ordering;

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, warn};

use crate::inventory::SeatInventory;
use crate::model::{Score, SeatId, Snapshot, Submission};
use crate::validation::check_preferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedReason {
    /// The student did not list any seat.
    NoPreferences,
    /// Every listed seat was already full when the student's turn came.
    PreferencesFull,
    /// The submission does not fit the seat inventory of this run, e.g. it names a seat that was
    /// removed after it was submitted.
    InvalidSubmission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Placement {
    /// `rank` is the position of the seat in the student's preferences, starting at one.
    Assigned { seat: SeatId, rank: usize },
    Unassigned { reason: UnassignedReason },
}

impl Placement {
    #[must_use]
    pub const fn seat(&self) -> Option<&SeatId> {
        match self {
            Self::Assigned { seat, .. } => Some(seat),
            Self::Unassigned { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub identity: String,
    pub score: Score,
    pub submitted_at: i64,
    #[serde(flatten)]
    pub placement: Placement,
}

/// Result of one allocation run. Outcomes are kept in the order the students were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Allocation {
    outcomes: Vec<Outcome>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl Allocation {
    fn new(outcomes: Vec<Outcome>) -> Self {
        let index = outcomes
            .iter()
            .enumerate()
            .map(|(position, outcome)| (outcome.identity.clone(), position))
            .collect();
        Self { outcomes, index }
    }

    #[must_use]
    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn outcome(&self, identity: &str) -> Option<&Outcome> {
        self.index
            .get(identity)
            .map(|&position| &self.outcomes[position])
    }

    #[must_use]
    pub fn placement(&self, identity: &str) -> Option<&Placement> {
        self.outcome(identity).map(|outcome| &outcome.placement)
    }

    #[must_use]
    pub fn seat_of(&self, identity: &str) -> Option<&SeatId> {
        self.placement(identity).and_then(Placement::seat)
    }

    /// Students per seat, in processing order. Seats nobody got are missing.
    #[must_use]
    pub fn occupancy(&self) -> BTreeMap<&SeatId, Vec<&str>> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .placement
                    .seat()
                    .map(|seat| (seat, outcome.identity.as_str()))
            })
            .into_group_map()
            .into_iter()
            .collect()
    }

    #[must_use]
    pub fn assigned(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.placement.seat().is_some())
            .count()
    }

    #[must_use]
    pub fn unassigned(&self) -> usize {
        self.outcomes.len() - self.assigned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Order in which students get to pick: higher score first, then earlier submission, then
/// identity. This is a total order for submissions with distinct identities.
#[must_use]
pub fn priority_order(left: &Submission, right: &Submission) -> Ordering {
    right
        .score
        .cmp(&left.score)
        .then_with(|| left.submitted_at.cmp(&right.submitted_at))
        .then_with(|| left.identity.cmp(&right.identity))
}

/// Assigns every student of the snapshot to the first seat of their preferences that still has
/// room when it is their turn, or leaves them unassigned.
///
/// Seats are never taken back, so a student processed later can not displace an earlier one
/// even if the seat is their first choice.
#[must_use]
#[tracing::instrument(level = "debug", skip_all, fields(students = snapshot.len(), seats = inventory.len()))]
pub fn allocate(snapshot: &Snapshot, inventory: &SeatInventory) -> Allocation {
    let mut remaining: BTreeMap<&SeatId, u32> = inventory
        .seats()
        .iter()
        .map(|seat| (&seat.id, seat.capacity))
        .collect();

    let outcomes: Vec<Outcome> = snapshot
        .iter()
        .sorted_by(|left, right| priority_order(left, right))
        .map(|submission| Outcome {
            identity: submission.identity.clone(),
            score: submission.score,
            submitted_at: submission.submitted_at,
            placement: place(submission, inventory, &mut remaining),
        })
        .collect();

    let allocation = Allocation::new(outcomes);
    debug!(
        assigned = allocation.assigned(),
        unassigned = allocation.unassigned(),
        "allocation finished"
    );
    allocation
}

fn place(
    submission: &Submission,
    inventory: &SeatInventory,
    remaining: &mut BTreeMap<&SeatId, u32>,
) -> Placement {
    if let Err(error) = check_preferences(&submission.preferences, inventory) {
        warn!(
            identity = %submission.identity,
            %error,
            "submission does not match the seat inventory, leaving it unassigned"
        );
        return Placement::Unassigned {
            reason: UnassignedReason::InvalidSubmission,
        };
    }
    if submission.preferences.is_empty() {
        return Placement::Unassigned {
            reason: UnassignedReason::NoPreferences,
        };
    }
    for (position, seat) in submission.preferences.iter().enumerate() {
        match remaining.get_mut(seat) {
            Some(free) if *free > 0 => {
                *free -= 1;
                return Placement::Assigned {
                    seat: seat.clone(),
                    rank: position + 1,
                };
            }
            _ => {}
        }
    }
    Placement::Unassigned {
        reason: UnassignedReason::PreferencesFull,
    }
}
