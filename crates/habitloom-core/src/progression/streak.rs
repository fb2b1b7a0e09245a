//! Consecutive-day streak derivation.
//!
//! The streak is always recomputed from scratch over the full active-date
//! set rather than incrementally adjusted: undoing a completion can remove
//! the day the whole streak was anchored on, and a fresh walk is the only
//! way to stay correct.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::habit::{DailyHabitRecord, UserStats};

/// Freeze state relevant to a streak walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreezeState {
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl FreezeState {
    /// Snapshot the freeze fields of `stats`.
    pub fn from_stats(stats: &UserStats) -> Self {
        Self {
            active: stats.freeze_active,
            expires_at: stats.freeze_expires_at,
        }
    }

    /// Whether the freeze protects a gap at `now`.
    pub fn covers(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map(|e| e > now).unwrap_or(false)
    }
}

/// Result of one backward streak walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakWalk {
    /// Consecutive active days ending at the walk's anchor
    pub current_streak: u32,
    /// The single missed day bridged by a freeze, if one was consumed
    pub consumed_gap: Option<NaiveDate>,
}

/// Collect the dates that have at least one completed record.
pub fn active_dates(records: &[DailyHabitRecord]) -> BTreeSet<NaiveDate> {
    records
        .iter()
        .filter(|r| r.completed)
        .map(|r| r.date)
        .collect()
}

/// Walk backward counting consecutive active days.
///
/// The walk is anchored at the most recent active date on or before
/// `event_date`: the event date only counts if it is itself active, and an
/// undo on the event date must not zero out a streak that still ends on an
/// earlier day. From the anchor, an active freeze lets the walk bridge
/// exactly one missed day (the bridged day does not count toward the
/// streak); a second gap, or any gap without an active freeze, ends the
/// walk.
///
/// An empty active set yields a streak of 0. Never fails.
pub fn walk_streak(
    active: &BTreeSet<NaiveDate>,
    event_date: NaiveDate,
    freeze: FreezeState,
    now: DateTime<Utc>,
) -> StreakWalk {
    let anchor = match active.range(..=event_date).next_back() {
        Some(anchor) => *anchor,
        None => {
            return StreakWalk {
                current_streak: 0,
                consumed_gap: None,
            }
        }
    };

    let mut streak = 0u32;
    let mut consumed_gap = None;
    let mut day = anchor;

    loop {
        if active.contains(&day) {
            streak += 1;
        } else if consumed_gap.is_none() && freeze.covers(now) {
            // one free pass per walk, not an indefinite pause
            consumed_gap = Some(day);
        } else {
            break;
        }

        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    StreakWalk {
        current_streak: streak,
        consumed_gap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn dates(days: &[u32]) -> BTreeSet<NaiveDate> {
        days.iter().map(|d| day(*d)).collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap()
    }

    fn active_freeze() -> FreezeState {
        FreezeState {
            active: true,
            expires_at: Some(now() + Duration::hours(12)),
        }
    }

    #[test]
    fn test_empty_log_yields_zero() {
        let walk = walk_streak(&BTreeSet::new(), day(20), FreezeState::default(), now());
        assert_eq!(walk.current_streak, 0);
        assert_eq!(walk.consumed_gap, None);
    }

    #[test]
    fn test_consecutive_days() {
        let walk = walk_streak(&dates(&[18, 19, 20]), day(20), FreezeState::default(), now());
        assert_eq!(walk.current_streak, 3);
    }

    #[test]
    fn test_inactive_event_date_falls_back_to_latest_active() {
        // the event date is not active, so the streak is the run ending
        // on the most recent active day before it
        let walk = walk_streak(&dates(&[18, 19]), day(20), FreezeState::default(), now());
        assert_eq!(walk.current_streak, 2);
        assert_eq!(walk.consumed_gap, None);
    }

    #[test]
    fn test_anchor_seek_preserves_freeze_for_gaps_in_the_run() {
        // days 19-20 sit above the anchor and are not gaps inside the run,
        // so the freeze is still free to bridge day 16
        let walk = walk_streak(&dates(&[15, 17, 18]), day(20), active_freeze(), now());
        assert_eq!(walk.current_streak, 3);
        assert_eq!(walk.consumed_gap, Some(day(16)));
    }

    #[test]
    fn test_gap_without_freeze_breaks() {
        let walk = walk_streak(&dates(&[17, 18, 20]), day(20), FreezeState::default(), now());
        assert_eq!(walk.current_streak, 1);
    }

    #[test]
    fn test_freeze_bridges_one_gap() {
        let walk = walk_streak(&dates(&[17, 18, 20]), day(20), active_freeze(), now());
        assert_eq!(walk.current_streak, 3);
        assert_eq!(walk.consumed_gap, Some(day(19)));
    }

    #[test]
    fn test_freeze_does_not_bridge_two_consecutive_gaps() {
        let walk = walk_streak(&dates(&[16, 17, 20]), day(20), active_freeze(), now());
        // day 19 consumes the freeze, day 18 ends the walk
        assert_eq!(walk.current_streak, 1);
        assert_eq!(walk.consumed_gap, Some(day(19)));
    }

    #[test]
    fn test_freeze_does_not_bridge_second_separated_gap() {
        let walk = walk_streak(&dates(&[14, 16, 18, 20]), day(20), active_freeze(), now());
        // gap at 19 is bridged, gap at 17 ends the walk
        assert_eq!(walk.current_streak, 2);
        assert_eq!(walk.consumed_gap, Some(day(19)));
    }

    #[test]
    fn test_expired_freeze_is_inert() {
        let expired = FreezeState {
            active: true,
            expires_at: Some(now() - Duration::hours(1)),
        };
        let walk = walk_streak(&dates(&[17, 18, 20]), day(20), expired, now());
        assert_eq!(walk.current_streak, 1);
        assert_eq!(walk.consumed_gap, None);
    }

    #[test]
    fn test_active_dates_ignores_skips_and_undos() {
        let base = Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap();
        let make = |d: u32, completed: bool| DailyHabitRecord {
            id: format!("rec-{d}-{completed}"),
            user_id: "user-1".to_string(),
            date: day(d),
            template_id: "tpl-1".to_string(),
            completed,
            skipped: false,
            skip_reason: None,
            xp_earned: if completed { 10 } else { 0 },
            completed_at: completed.then_some(base),
            created_at: base,
        };
        let records = vec![make(1, true), make(2, false), make(3, true)];
        assert_eq!(active_dates(&records), dates(&[1, 3]));
    }
}
