//! Habit data model: templates, daily records, and per-user stats.
//!
//! A [`HabitTemplate`] defines a habit with an XP value. Acting on a habit
//! for a given date creates exactly one [`DailyHabitRecord`] per
//! (user, date, template) key; the record is then patched on every further
//! action for that day, never deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ValidationError};

/// Parse a `"YYYY-MM-DD"` date string supplied by a caller.
///
/// Dates arrive already localized to the user's calendar; no timezone
/// conversion happens here.
pub fn parse_day(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(value.to_string()))
}

/// A habit definition with an XP value.
///
/// Editing `xp_value` or `name` never rewrites `xp_earned` on past
/// completion records; those keep the value snapshotted when completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitTemplate {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Category the habit belongs to
    pub category_id: String,
    /// Display name
    pub name: String,
    /// Optional subtitle shown under the name
    pub subtitle: Option<String>,
    /// XP awarded per completion (1-10000)
    pub xp_value: i64,
    /// Core habits count toward the daily baseline
    pub is_core: bool,
    /// Display position within the category
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

/// Completion state of a daily record.
///
/// States follow strict transitions:
///
///   UNTOUCHED ──> COMPLETED <──> UNCOMPLETED
///       |             ^  |            |
///       |             |  v            |
///       +────────> SKIPPED <──────────+
///
/// Valid transitions:
/// - UNTOUCHED → COMPLETED (first completion creates the record)
/// - UNTOUCHED → SKIPPED (first skip creates the record)
/// - COMPLETED → UNCOMPLETED (toggle off, an undo)
/// - UNCOMPLETED → COMPLETED (toggle back on)
/// - COMPLETED/UNCOMPLETED → SKIPPED
/// - SKIPPED → COMPLETED (completing clears the skip)
/// - SKIPPED → SKIPPED (re-skip with a different reason)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordState {
    /// No record exists yet for the (user, date, template) key
    Untouched,
    /// Habit completed for the day
    Completed,
    /// Completion toggled back off
    Uncompleted,
    /// Deliberately skipped with a reason
    Skipped,
}

impl RecordState {
    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &RecordState) -> bool {
        match self {
            RecordState::Untouched => {
                matches!(to, RecordState::Completed | RecordState::Skipped)
            }
            RecordState::Completed => {
                matches!(to, RecordState::Uncompleted | RecordState::Skipped)
            }
            RecordState::Uncompleted => {
                matches!(to, RecordState::Completed | RecordState::Skipped)
            }
            RecordState::Skipped => {
                matches!(to, RecordState::Completed | RecordState::Skipped)
            }
        }
    }
}

/// Allowed reasons for skipping a habit.
///
/// A closed set so analytics grouping stays exact; free-form strings are
/// rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoTime,
    LowEnergy,
    Sick,
    Travel,
    Forgot,
    NotToday,
    Other,
}

impl SkipReason {
    /// All allowed reasons, in display order.
    pub const ALL: [SkipReason; 7] = [
        SkipReason::NoTime,
        SkipReason::LowEnergy,
        SkipReason::Sick,
        SkipReason::Travel,
        SkipReason::Forgot,
        SkipReason::NotToday,
        SkipReason::Other,
    ];

    /// Stable string form used in storage and CLI arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoTime => "no_time",
            SkipReason::LowEnergy => "low_energy",
            SkipReason::Sick => "sick",
            SkipReason::Travel => "travel",
            SkipReason::Forgot => "forgot",
            SkipReason::NotToday => "not_today",
            SkipReason::Other => "other",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkipReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_time" => Ok(SkipReason::NoTime),
            "low_energy" => Ok(SkipReason::LowEnergy),
            "sick" => Ok(SkipReason::Sick),
            "travel" => Ok(SkipReason::Travel),
            "forgot" => Ok(SkipReason::Forgot),
            "not_today" => Ok(SkipReason::NotToday),
            "other" => Ok(SkipReason::Other),
            _ => Err(ValidationError::UnknownSkipReason(s.to_string())),
        }
    }
}

/// One record per (user, date, template) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyHabitRecord {
    /// Unique identifier
    pub id: String,
    pub user_id: String,
    /// The user-local calendar day this record belongs to
    pub date: NaiveDate,
    pub template_id: String,
    /// Whether the habit was completed for the day
    pub completed: bool,
    /// Whether the habit was deliberately skipped (exclusive with `completed`)
    pub skipped: bool,
    /// Present iff skipped
    pub skip_reason: Option<SkipReason>,
    /// XP snapshotted from the template at completion time, 0 otherwise
    pub xp_earned: i64,
    /// Present iff completed
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DailyHabitRecord {
    /// Current state in the completion state machine.
    pub fn state(&self) -> RecordState {
        if self.skipped {
            RecordState::Skipped
        } else if self.completed {
            RecordState::Completed
        } else {
            RecordState::Uncompleted
        }
    }

    /// Verify structural invariants on a record read back from storage.
    ///
    /// A record both completed and skipped can only come from a
    /// data-corruption bug; surface it rather than repairing it.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        if self.completed && self.skipped {
            return Err(CoreError::InvariantViolation(format!(
                "record {} is both completed and skipped",
                self.id
            )));
        }
        if self.completed && self.completed_at.is_none() {
            return Err(CoreError::InvariantViolation(format!(
                "record {} is completed without a completion timestamp",
                self.id
            )));
        }
        Ok(())
    }
}

/// Per-user progression totals, updated alongside every record write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    /// Cumulative XP after all adjustments. Deliberately not clamped:
    /// concurrent template edits can transiently drive this negative.
    pub total_xp: i64,
    /// Always recomputed from `total_xp`, never patched independently
    pub level: i64,
    /// Consecutive active days ending at the most recent event date
    pub current_streak: u32,
    /// High-water mark of `current_streak`
    pub longest_streak: u32,
    /// Active days in the current Sunday-start calendar week (0-7)
    pub week_score: u8,
    /// Remaining streak freezes this month
    pub freezes_available: u8,
    /// Whether a freeze is currently protecting the streak
    pub freeze_active: bool,
    /// When the active freeze lapses
    pub freeze_expires_at: Option<DateTime<Utc>>,
    pub last_freeze_used_at: Option<DateTime<Utc>>,
    /// `"YYYY-MM"` month in which freezes were last refilled
    pub freeze_refill_month: Option<String>,
    /// End of the window in which a freshly broken streak may be rescued
    pub repair_window_end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl UserStats {
    /// Fresh stats for a user with `freezes` monthly freezes available.
    pub fn new(user_id: impl Into<String>, freezes: u8, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            total_xp: 0,
            level: 0,
            current_streak: 0,
            longest_streak: 0,
            week_score: 0,
            freezes_available: freezes,
            freeze_active: false,
            freeze_expires_at: None,
            last_freeze_used_at: None,
            freeze_refill_month: Some(now.format("%Y-%m").to_string()),
            repair_window_end: None,
            updated_at: now,
        }
    }

    /// Whether a freeze is protecting the streak at `now`.
    ///
    /// Expiry is evaluated lazily against the stored timestamp; there is
    /// no background sweep.
    pub fn freeze_is_active(&self, now: DateTime<Utc>) -> bool {
        self.freeze_active
            && self
                .freeze_expires_at
                .map(|expires| expires > now)
                .unwrap_or(false)
    }

    /// Whether a recently broken streak is still within its repair window.
    pub fn repair_window_open(&self, now: DateTime<Utc>) -> bool {
        self.repair_window_end
            .map(|end| end > now)
            .unwrap_or(false)
    }
}

/// Streak-protection status for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeStatus {
    /// Whether a freeze is active right now
    pub active: bool,
    /// When the active freeze lapses, if any
    pub expires_at: Option<DateTime<Utc>>,
    /// Freezes remaining this month
    pub freezes_available: u8,
    /// End of an open streak-repair window, if any
    pub repair_window_end: Option<DateTime<Utc>>,
}

/// User stats enriched with derived level progress, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(flatten)]
    pub stats: UserStats,
    /// XP still needed to reach the next level
    pub xp_for_next_level: i64,
    /// XP accumulated within the current level
    pub current_level_progress: i64,
}
