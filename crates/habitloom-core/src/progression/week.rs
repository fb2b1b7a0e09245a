//! Week scoring and week numbering.
//!
//! Two deliberately distinct week conventions live here:
//!
//! - [`calendar_week_score`] scores the Sunday-start calendar week
//!   containing a date (0-7 active days). This is the convention the week
//!   score has always used.
//! - [`iso_week_number`] is the Monday-start ISO week, used only for
//!   grouping in analytics.
//!
//! They must not be unified: switching the score to ISO weeks would change
//! observable week-score values around weekends.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};

/// Number of active days in the Sunday-start week containing `date`.
///
/// `active` is the set of dates with at least one completed habit.
/// `week_days` is the number of scored days from the start of the week
/// (7 for a full calendar week), so the result is within 0..=week_days.
pub fn calendar_week_score(active: &BTreeSet<NaiveDate>, date: NaiveDate, week_days: u32) -> u8 {
    let start_of_week = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    (0..week_days as i64)
        .filter(|offset| active.contains(&(start_of_week + Duration::days(*offset))))
        .count() as u8
}

/// ISO 8601 week number (Monday-start) of `date`.
pub fn iso_week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// ISO week-year and week number, for grouping across year boundaries.
pub fn iso_year_week(date: NaiveDate) -> (i32, u32) {
    let week = date.iso_week();
    (week.year(), week.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_score_counts_active_days() {
        // 2026-08-02 is a Sunday
        let active: BTreeSet<_> = [day(2026, 8, 2), day(2026, 8, 4), day(2026, 8, 8)]
            .into_iter()
            .collect();
        assert_eq!(calendar_week_score(&active, day(2026, 8, 5), 7), 3);
    }

    #[test]
    fn test_week_score_ignores_other_weeks() {
        let active: BTreeSet<_> = [day(2026, 8, 1), day(2026, 8, 9)].into_iter().collect();
        // Both dates fall outside the Sunday-start week of Aug 2-8
        assert_eq!(calendar_week_score(&active, day(2026, 8, 5), 7), 0);
    }

    #[test]
    fn test_week_starts_sunday_not_monday() {
        // Saturday Aug 1 and Sunday Aug 2 are in different calendar weeks
        let active: BTreeSet<_> = [day(2026, 8, 1)].into_iter().collect();
        assert_eq!(calendar_week_score(&active, day(2026, 8, 1), 7), 1);
        assert_eq!(calendar_week_score(&active, day(2026, 8, 2), 7), 0);
    }

    #[test]
    fn test_empty_active_set() {
        assert_eq!(calendar_week_score(&BTreeSet::new(), day(2026, 8, 5), 7), 0);
    }

    #[test]
    fn test_iso_week_number() {
        // 2021-01-01 (a Friday) belongs to ISO week 53 of 2020
        assert_eq!(iso_year_week(day(2021, 1, 1)), (2020, 53));
        assert_eq!(iso_week_number(day(2026, 8, 7)), 32);
    }

    #[test]
    fn test_conventions_differ_on_sundays() {
        // Sunday 2026-08-02: a fresh Sunday-start week, but still the
        // previous Monday-start ISO week
        let sunday = day(2026, 8, 2);
        let prior_saturday = day(2026, 8, 1);
        assert_eq!(iso_week_number(sunday), iso_week_number(prior_saturday));

        let active: BTreeSet<_> = [prior_saturday].into_iter().collect();
        assert_eq!(calendar_week_score(&active, sunday, 7), 0);
    }

    proptest! {
        #[test]
        fn prop_week_score_in_range(
            offsets in proptest::collection::btree_set(0i64..365, 0..40),
            anchor in 0i64..365,
        ) {
            let base = day(2026, 1, 1);
            let active: BTreeSet<_> =
                offsets.into_iter().map(|o| base + Duration::days(o)).collect();
            let score = calendar_week_score(&active, base + Duration::days(anchor), 7);
            prop_assert!(score <= 7);
        }
    }
}
