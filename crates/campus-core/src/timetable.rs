//! # Timetable Conflict Rules
//!
//! Pure double-booking detection for timetable entries.
//!
//! ## Check Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Proposed slot (class, teacher, room?, period, day, year)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. CLASS   : any active entry for this class in (period, day, year)?  │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  2. TEACHER : any active entry for this teacher in the same slot?      │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  3. ROOM    : skipped when no room is given                            │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  OK → insert / update                                                  │
//! │                                                                         │
//! │  The first hit wins: a request violating several rules reports only    │
//! │  the first one in this order.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database layer loads the active entries occupying the same
//! (period, day, year) inside its transaction and hands them to
//! [`detect_conflict`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::TimetableEntry;
use crate::validation::{validate_academic_year, validate_day_of_week, validate_required};

/// Which uniqueness rule a booking violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotConflict {
    Class,
    Teacher,
    Room,
}

impl SlotConflict {
    /// Fixed evaluation order of the three rules.
    pub const ORDER: [SlotConflict; 3] = [SlotConflict::Class, SlotConflict::Teacher, SlotConflict::Room];

    pub fn message(&self) -> &'static str {
        match self {
            SlotConflict::Class => "Class is already booked for this period",
            SlotConflict::Teacher => "Teacher is already booked for this period",
            SlotConflict::Room => "Room is already occupied for this period",
        }
    }
}

impl fmt::Display for SlotConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// The tuple a timetable booking occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSlot {
    pub class_id: String,
    pub teacher_id: String,
    pub room_id: Option<String>,
    pub period_id: String,
    pub day_of_week: i64,
    pub academic_year: String,
}

impl BookingSlot {
    /// Validates field formats before any lookup runs.
    pub fn validate(&self) -> CoreResult<()> {
        validate_required("class_id", &self.class_id)?;
        validate_required("teacher_id", &self.teacher_id)?;
        validate_required("period_id", &self.period_id)?;
        validate_day_of_week(self.day_of_week)?;
        validate_academic_year(&self.academic_year)?;
        if let Some(room_id) = &self.room_id {
            validate_required("room_id", room_id)?;
        }
        Ok(())
    }

    /// Slot of an existing entry.
    pub fn of(entry: &TimetableEntry) -> Self {
        BookingSlot {
            class_id: entry.class_id.clone(),
            teacher_id: entry.teacher_id.clone(),
            room_id: entry.room_id.clone(),
            period_id: entry.period_id.clone(),
            day_of_week: entry.day_of_week,
            academic_year: entry.academic_year.clone(),
        }
    }

    /// True when `entry` occupies the same (period, day, year) key.
    pub fn shares_time_with(&self, entry: &TimetableEntry) -> bool {
        entry.period_id == self.period_id
            && entry.day_of_week == self.day_of_week
            && entry.academic_year == self.academic_year
    }

    fn collides(&self, rule: SlotConflict, entry: &TimetableEntry) -> bool {
        match rule {
            SlotConflict::Class => entry.class_id == self.class_id,
            SlotConflict::Teacher => entry.teacher_id == self.teacher_id,
            SlotConflict::Room => match (&self.room_id, &entry.room_id) {
                (Some(mine), Some(theirs)) => mine == theirs,
                _ => false,
            },
        }
    }
}

/// Returns the first violated rule, in [`SlotConflict::ORDER`].
///
/// Only active entries sharing the slot's (period, day, year) are considered,
/// and `exclude_id` (the entry being updated) is ignored.
pub fn detect_conflict(
    slot: &BookingSlot,
    occupants: &[TimetableEntry],
    exclude_id: Option<&str>,
) -> Option<SlotConflict> {
    let relevant: Vec<&TimetableEntry> = occupants
        .iter()
        .filter(|e| e.is_active)
        .filter(|e| Some(e.id.as_str()) != exclude_id)
        .filter(|e| slot.shares_time_with(e))
        .collect();

    SlotConflict::ORDER
        .into_iter()
        .filter(|rule| *rule != SlotConflict::Room || slot.room_id.is_some())
        .find(|rule| relevant.iter().any(|e| slot.collides(*rule, e)))
}

/// [`detect_conflict`] as a `Result`, for use with `?`.
pub fn check_conflicts(
    slot: &BookingSlot,
    occupants: &[TimetableEntry],
    exclude_id: Option<&str>,
) -> CoreResult<()> {
    match detect_conflict(slot, occupants, exclude_id) {
        Some(conflict) => Err(CoreError::Timetable(conflict)),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
