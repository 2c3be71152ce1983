use alloc::collections::btree_map::{self, BTreeMap};
use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a seat, for example `group-1/row-3`.
///
/// The engine only ever compares seat ids for equality, the composite structure is a
/// convention of the seat layout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatId(String);

impl SeatId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Seat id of row `row` in group number `group`, both counted from one.
    #[must_use]
    pub fn for_row(group: usize, row: u32) -> Self {
        Self(format!("group-{group}/row-{row}"))
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeatId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SeatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Score(pub u32);

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The latest submission of one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub identity: String,
    pub score: Score,
    /// Ranked seat preferences, most wanted first.
    pub preferences: Vec<SeatId>,
    /// Milliseconds since the unix epoch, strictly increasing per store.
    pub submitted_at: i64,
}

/// A consistent view of all current submissions, at most one per identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    submissions: BTreeMap<String, Submission>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a submission. If the identity is already present the later submission wins, on equal
    /// timestamps the one inserted last.
    pub fn insert(&mut self, submission: Submission) {
        match self.submissions.entry(submission.identity.clone()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(submission);
            }
            btree_map::Entry::Occupied(mut entry) => {
                if entry.get().submitted_at <= submission.submitted_at {
                    entry.insert(submission);
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&Submission> {
        self.submissions.get(identity)
    }

    /// Submissions ordered by identity.
    pub fn iter(&self) -> impl Iterator<Item = &Submission> {
        self.submissions.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }
}

impl FromIterator<Submission> for Snapshot {
    fn from_iter<T: IntoIterator<Item = Submission>>(iter: T) -> Self {
        let mut snapshot = Self::new();
        iter.into_iter()
            .for_each(|submission| snapshot.insert(submission));
        snapshot
    }
}
