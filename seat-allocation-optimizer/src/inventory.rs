use alloc::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::SeatId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("seat {0} is defined more than once")]
    DuplicateSeat(SeatId),
    #[error("seat {0} has no capacity")]
    ZeroCapacity(SeatId),
    #[error("seat group {0} has no rows")]
    EmptyGroup(String),
    #[error("seat group {0} is defined more than once")]
    DuplicateGroup(String),
}

/// One block of rows in the room. Every row is one seat that takes `capacity` students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatGroup {
    pub name: String,
    pub rows: u32,
    pub capacity: u32,
}

/// The classroom the service was first written for: four groups of rows, two students per row.
#[must_use]
pub fn default_layout() -> Vec<SeatGroup> {
    [("Group 1", 7), ("Group 2", 8), ("Group 3", 8), ("Group 4", 7)]
        .into_iter()
        .map(|(name, rows)| SeatGroup {
            name: name.to_owned(),
            rows,
            capacity: 2,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Seat {
    pub id: SeatId,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
}

impl Seat {
    pub fn new(id: impl Into<SeatId>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            group: None,
            row: None,
        }
    }
}

/// The fixed set of seats an allocation runs against, in layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatInventory {
    seats: Vec<Seat>,
    index: BTreeMap<SeatId, usize>,
}

impl SeatInventory {
    pub fn new(seats: impl IntoIterator<Item = Seat>) -> Result<Self, InventoryError> {
        let mut inventory = Self::default();
        for seat in seats {
            if seat.capacity == 0 {
                return Err(InventoryError::ZeroCapacity(seat.id));
            }
            if inventory.index.contains_key(&seat.id) {
                return Err(InventoryError::DuplicateSeat(seat.id));
            }
            inventory
                .index
                .insert(seat.id.clone(), inventory.seats.len());
            inventory.seats.push(seat);
        }
        Ok(inventory)
    }

    /// Expands groups of rows into seats. Group `i` row `r` (both from one) becomes
    /// `group-i/row-r`.
    pub fn from_layout(groups: &[SeatGroup]) -> Result<Self, InventoryError> {
        let mut names = BTreeSet::new();
        let mut seats = Vec::new();
        for (index, group) in groups.iter().enumerate() {
            if !names.insert(group.name.as_str()) {
                return Err(InventoryError::DuplicateGroup(group.name.clone()));
            }
            if group.rows == 0 {
                return Err(InventoryError::EmptyGroup(group.name.clone()));
            }
            seats.extend((1..=group.rows).map(|row| Seat {
                id: SeatId::for_row(index + 1, row),
                capacity: group.capacity,
                group: Some(group.name.clone()),
                row: Some(row),
            }));
        }
        Self::new(seats)
    }

    #[must_use]
    pub fn get(&self, id: &SeatId) -> Option<&Seat> {
        self.index.get(id).map(|&position| &self.seats[position])
    }

    #[must_use]
    pub fn contains(&self, id: &SeatId) -> bool {
        self.index.contains_key(id)
    }

    #[must_use]
    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    #[must_use]
    pub fn total_capacity(&self) -> u64 {
        self.seats.iter().map(|seat| u64::from(seat.capacity)).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}
