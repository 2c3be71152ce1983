use alloc::collections::BTreeSet;

use serde::Deserialize;
use thiserror::Error;

use crate::inventory::SeatInventory;
use crate::model::{Score, SeatId, Submission};

pub const MAX_IDENTITY_LENGTH: usize = 128;

/// Reasons a submission is rejected. The message is shown to the student as is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("identity must not be empty")]
    EmptyIdentity,
    #[error("identity must not be longer than {} characters", MAX_IDENTITY_LENGTH)]
    IdentityTooLong,
    #[error("score must not be negative, got {0}")]
    NegativeScore(i64),
    #[error("score {0} is too large")]
    ScoreOutOfRange(i64),
    #[error("unknown seat {0}")]
    UnknownSeat(SeatId),
    #[error("seat {0} is listed more than once")]
    DuplicatePreference(SeatId),
}

/// A submission as it arrives from a student, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub identity: String,
    pub score: i64,
    #[serde(default)]
    pub preferences: Vec<String>,
}

impl SubmissionRequest {
    /// Checks the request against the seat inventory and stamps it with `submitted_at`.
    ///
    /// Surrounding whitespace of the identity and the seat ids is ignored.
    pub fn validate(
        self,
        inventory: &SeatInventory,
        submitted_at: i64,
    ) -> Result<Submission, ValidationError> {
        let identity = self.identity.trim();
        if identity.is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }
        if identity.chars().count() > MAX_IDENTITY_LENGTH {
            return Err(ValidationError::IdentityTooLong);
        }
        if self.score < 0 {
            return Err(ValidationError::NegativeScore(self.score));
        }
        let score = u32::try_from(self.score)
            .map(Score)
            .map_err(|_| ValidationError::ScoreOutOfRange(self.score))?;
        let preferences: Vec<SeatId> = self
            .preferences
            .iter()
            .map(|seat| SeatId::from(seat.trim()))
            .collect();
        check_preferences(&preferences, inventory)?;
        Ok(Submission {
            identity: identity.to_owned(),
            score,
            preferences,
            submitted_at,
        })
    }
}

/// Every preference must name a seat of the inventory, and no seat may be listed twice.
pub fn check_preferences(
    preferences: &[SeatId],
    inventory: &SeatInventory,
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for seat in preferences {
        if !inventory.contains(seat) {
            return Err(ValidationError::UnknownSeat(seat.clone()));
        }
        if !seen.insert(seat) {
            return Err(ValidationError::DuplicatePreference(seat.clone()));
        }
    }
    Ok(())
}
