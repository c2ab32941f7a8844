//! Slot-managed staff model
//!
//! The staff has a fixed number of slots (`CAPACITY`), numbered from 1.
//! Each slot is either free or holds exactly one `NoteEntry`. Invariants
//! maintained by every operation:
//!
//! - at most `CAPACITY` entries
//! - entry positions are distinct and within `1..=CAPACITY`
//! - occupied positions and free positions together are exactly `1..=CAPACITY`
//! - insertion always targets the lowest free position
//!
//! Positions are never compacted by `remove`. `shuffle` is the only
//! operation that compacts entries toward the front.

use crate::models::indicator::IndicatorId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of slots on the staff
pub const CAPACITY: u8 = 8;

/// Errors from staff mutations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StaffError {
    /// No free slot left for an insert
    #[error("Staff is full! Maximum {} notes allowed.", CAPACITY)]
    StaffFull,

    /// Position outside `1..=CAPACITY`
    #[error("Invalid slot position {0} (must be 1-{})", CAPACITY)]
    InvalidSlot(u8),

    /// An insert without any indicator
    #[error("A note needs at least one indicator")]
    NoIndicators,
}

/// A country + indicator selection bound to one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEntry {
    /// Slot index (1-based)
    pub position: u8,

    /// Originating country (ISO code)
    pub country_id: String,

    /// Display name
    pub country_label: String,

    /// Chosen indicators, in selection order, non-empty
    pub indicator_ids: Vec<IndicatorId>,
}

/// What a swap did to the two slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwapOutcome {
    /// Same position given twice
    Unchanged,
    /// Both slots were free
    BothFree,
    /// One entry moved into a free slot
    Moved,
    /// Two entries exchanged slots
    Exchanged,
}

/// Is `position` a valid slot index
pub fn is_valid_position(position: u8) -> bool {
    (1..=CAPACITY).contains(&position)
}

fn check_position(position: u8) -> Result<(), StaffError> {
    if is_valid_position(position) {
        Ok(())
    } else {
        log::warn!("Rejected slot position {} (valid range 1-{})", position, CAPACITY);
        Err(StaffError::InvalidSlot(position))
    }
}

/// The fixed-capacity ordered collection of note entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffModel {
    entries: Vec<NoteEntry>,
}

impl StaffModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest free position, or `None` when full
    pub fn next_free_position(&self) -> Option<u8> {
        (1..=CAPACITY).find(|pos| !self.is_occupied(*pos))
    }

    pub fn has_space(&self) -> bool {
        self.entries.len() < CAPACITY as usize
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn free_count(&self) -> usize {
        CAPACITY as usize - self.entries.len()
    }

    pub fn is_occupied(&self, position: u8) -> bool {
        self.entries.iter().any(|e| e.position == position)
    }

    pub fn get(&self, position: u8) -> Option<&NoteEntry> {
        self.entries.iter().find(|e| e.position == position)
    }

    /// Entries in insertion order (not position order)
    pub fn entries(&self) -> &[NoteEntry] {
        &self.entries
    }

    /// Entries sorted by position
    pub fn entries_in_order(&self) -> Vec<&NoteEntry> {
        let mut ordered: Vec<&NoteEntry> = self.entries.iter().collect();
        ordered.sort_by_key(|e| e.position);
        ordered
    }

    pub fn occupied_positions(&self) -> Vec<u8> {
        self.entries_in_order().iter().map(|e| e.position).collect()
    }

    pub fn free_positions(&self) -> Vec<u8> {
        (1..=CAPACITY).filter(|pos| !self.is_occupied(*pos)).collect()
    }

    /// Place a new entry at the lowest free position.
    ///
    /// The model is left untouched on any error.
    pub fn insert(
        &mut self,
        country_id: impl Into<String>,
        country_label: impl Into<String>,
        indicator_ids: Vec<IndicatorId>,
    ) -> Result<u8, StaffError> {
        if indicator_ids.is_empty() {
            return Err(StaffError::NoIndicators);
        }
        let position = self.next_free_position().ok_or(StaffError::StaffFull)?;

        let entry = NoteEntry {
            position,
            country_id: country_id.into(),
            country_label: country_label.into(),
            indicator_ids,
        };
        log::debug!(
            "Staff insert: {} at position {} ({}/{})",
            entry.country_label,
            position,
            self.entries.len() + 1,
            CAPACITY
        );
        self.entries.push(entry);
        Ok(position)
    }

    /// Remove the entry at `position`. Absent entries are a benign no-op
    /// (`Ok(None)`); other entries keep their positions.
    pub fn remove(&mut self, position: u8) -> Result<Option<NoteEntry>, StaffError> {
        check_position(position)?;
        let removed = self
            .entries
            .iter()
            .position(|e| e.position == position)
            .map(|idx| self.entries.remove(idx));
        if removed.is_some() {
            log::debug!("Staff remove: position {} ({}/{})", position, self.entries.len(), CAPACITY);
        }
        Ok(removed)
    }

    /// Remove every entry
    pub fn clear(&mut self) -> Vec<NoteEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Exchange the occupancy of two slots.
    ///
    /// Entries keep their identity and content; only their `position`
    /// changes. Applying the same swap twice restores the original state.
    pub fn swap(&mut self, a: u8, b: u8) -> Result<SwapOutcome, StaffError> {
        check_position(a)?;
        check_position(b)?;
        if a == b {
            return Ok(SwapOutcome::Unchanged);
        }

        let idx_a = self.entries.iter().position(|e| e.position == a);
        let idx_b = self.entries.iter().position(|e| e.position == b);

        let outcome = match (idx_a, idx_b) {
            (Some(ia), Some(ib)) => {
                self.entries[ia].position = b;
                self.entries[ib].position = a;
                SwapOutcome::Exchanged
            }
            (Some(ia), None) => {
                self.entries[ia].position = b;
                SwapOutcome::Moved
            }
            (None, Some(ib)) => {
                self.entries[ib].position = a;
                SwapOutcome::Moved
            }
            (None, None) => SwapOutcome::BothFree,
        };
        Ok(outcome)
    }

    /// Randomly reorder the occupied entries and compact them into
    /// positions `1..=n`.
    ///
    /// Fisher-Yates, backward: for `i` from the last index down to 1, swap
    /// element `i` with a uniformly chosen index in `[0, i]`. The
    /// permutation is applied to the entries in position order.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.entries.sort_by_key(|e| e.position);
        for i in (1..self.entries.len()).rev() {
            let j = rng.gen_range(0..=i);
            self.entries.swap(i, j);
        }
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            entry.position = idx as u8 + 1;
        }
    }

    /// Check every structural invariant. Used by tests and debug assertions.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.entries.len() > CAPACITY as usize {
            return Err(format!("{} entries exceed capacity {}", self.entries.len(), CAPACITY));
        }
        let mut seen = [false; CAPACITY as usize + 1];
        for entry in &self.entries {
            if !is_valid_position(entry.position) {
                return Err(format!("entry {} has position {}", entry.country_id, entry.position));
            }
            if seen[entry.position as usize] {
                return Err(format!("position {} is held twice", entry.position));
            }
            if entry.indicator_ids.is_empty() {
                return Err(format!("entry at {} has no indicators", entry.position));
            }
            seen[entry.position as usize] = true;
        }
        let occupied = self.occupied_positions().len();
        let free = self.free_positions().len();
        if occupied + free != CAPACITY as usize {
            return Err(format!("occupied {} + free {} != {}", occupied, free, CAPACITY));
        }
        Ok(())
    }
}
