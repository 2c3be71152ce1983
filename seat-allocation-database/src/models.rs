use diesel::prelude::*;
use seat_allocation_optimizer::{Score, SeatId, Snapshot, Submission};
use serde::Serialize;
use tracing::warn;

use crate::schema::students;

/// A stored submission together with the seat published for it by the last allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentRecord {
    pub identity: String,
    pub score: Score,
    pub preferences: Vec<SeatId>,
    pub admitted: Option<SeatId>,
    pub submitted_at: i64,
    /// Set when the stored row could not be read as a submission. Such a record is listed but
    /// never allocated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrupt: Option<String>,
}

impl StudentRecord {
    #[must_use]
    pub fn submission(&self) -> Submission {
        Submission {
            identity: self.identity.clone(),
            score: self.score,
            preferences: self.preferences.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Builds the allocation input from stored records. Corrupt records are logged and left out so
/// they only cost their own student a seat.
pub fn snapshot_of(records: impl IntoIterator<Item = StudentRecord>) -> Snapshot {
    records
        .into_iter()
        .filter_map(|record| match &record.corrupt {
            Some(reason) => {
                warn!(identity = %record.identity, %reason, "skipping corrupt submission");
                None
            }
            None => Some(record.submission()),
        })
        .collect()
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentRow {
    pub identity: String,
    pub score: i64,
    pub preferences: Vec<String>,
    pub admitted: Option<String>,
    pub submitted_at: i64,
}

impl From<StudentRow> for StudentRecord {
    fn from(row: StudentRow) -> Self {
        let (score, corrupt) = match u32::try_from(row.score) {
            Ok(score) => (Score(score), None),
            Err(_) => (Score(0), Some(format!("score {} is out of range", row.score))),
        };
        Self {
            identity: row.identity,
            score,
            preferences: row.preferences.into_iter().map(SeatId::from).collect(),
            admitted: row.admitted.map(SeatId::from),
            submitted_at: row.submitted_at,
            corrupt,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = students)]
pub struct NewStudent {
    pub identity: String,
    pub score: i64,
    pub preferences: Vec<String>,
    pub submitted_at: i64,
}

impl From<Submission> for NewStudent {
    fn from(submission: Submission) -> Self {
        Self {
            identity: submission.identity,
            score: i64::from(submission.score.0),
            preferences: submission
                .preferences
                .iter()
                .map(|seat| seat.as_str().to_owned())
                .collect(),
            submitted_at: submission.submitted_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use seat_allocation_optimizer::{allocate, Placement, Seat, SeatInventory};

    use super::*;

    fn row(identity: &str, score: i64, preferences: &[&str], submitted_at: i64) -> StudentRow {
        StudentRow {
            identity: identity.to_owned(),
            score,
            preferences: preferences.iter().map(|&seat| seat.to_owned()).collect(),
            admitted: None,
            submitted_at,
        }
    }

    #[test]
    fn readable_row_becomes_a_submission() {
        let record = StudentRecord::from(row("li", 95, &["a", "b"], 7));
        assert_eq!(record.corrupt, None);
        assert_eq!(
            record.submission(),
            Submission {
                identity: "li".to_owned(),
                score: Score(95),
                preferences: vec![SeatId::from("a"), SeatId::from("b")],
                submitted_at: 7,
            }
        );
    }

    #[test]
    fn oversized_score_marks_only_that_record() {
        let records: Vec<StudentRecord> = [
            row("broken", 5_000_000_000, &["a"], 1),
            row("fine", 10, &["a"], 2),
        ]
        .into_iter()
        .map(StudentRecord::from)
        .collect();
        assert_eq!(
            records[0].corrupt.as_deref(),
            Some("score 5000000000 is out of range")
        );
        assert_eq!(records[1].corrupt, None);

        let snapshot = snapshot_of(records);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get("broken").is_none());

        let inventory = SeatInventory::new([Seat::new("a", 1)]).unwrap();
        let allocation = allocate(&snapshot, &inventory);
        assert!(matches!(
            allocation.placement("fine"),
            Some(Placement::Assigned { seat, rank: 1 }) if seat.as_str() == "a"
        ));
    }

    #[test]
    fn corrupt_marker_is_listed() {
        let record = StudentRecord::from(row("broken", -1, &[], 1));
        let listed = serde_json::to_value(&record).unwrap();
        assert_eq!(listed["corrupt"], "score -1 is out of range");
        let fine = serde_json::to_value(StudentRecord::from(row("fine", 1, &[], 1))).unwrap();
        assert!(fine.get("corrupt").is_none());
    }
}
