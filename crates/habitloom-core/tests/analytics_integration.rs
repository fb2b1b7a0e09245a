//! Integration tests for pattern analytics over the stored completion log.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use habitloom_core::{HabitDb, ProgressionCoordinator, SkipReason};

fn coordinator() -> ProgressionCoordinator {
    ProgressionCoordinator::new(HabitDb::open_memory().unwrap())
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 5, 9, 0, 0).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
}

fn add_template(c: &ProgressionCoordinator, name: &str, xp: i64) -> String {
    c.db()
        .create_template(c.config(), "user-1", "general", name, None, xp, false, now())
        .unwrap()
        .id
}

#[test]
fn test_pattern_report_over_stored_window() {
    let mut c = coordinator();
    let run = add_template(&c, "Run", 50);
    let read = add_template(&c, "Read", 20);

    c.complete_habit("user-1", &run, "2026-08-01", now()).unwrap();
    c.complete_habit("user-1", &run, "2026-08-02", now()).unwrap();
    c.skip_habit("user-1", &run, "2026-08-03", SkipReason::Sick, now())
        .unwrap();
    c.skip_habit("user-1", &read, "2026-08-01", SkipReason::Sick, now())
        .unwrap();
    c.skip_habit("user-1", &read, "2026-08-02", SkipReason::NoTime, now())
        .unwrap();

    let report = c.pattern_report("user-1", 30, today()).unwrap();

    assert_eq!(report.overall.total_records, 5);
    assert_eq!(report.overall.completed, 2);
    assert_eq!(report.overall.skipped, 3);
    assert_eq!(report.overall.completion_rate, 40.0);

    // worst habit first
    assert_eq!(report.habit_performance[0].name, "Read");
    assert_eq!(report.habit_performance[0].completion_rate, 0.0);
    assert_eq!(report.habit_performance[1].name, "Run");

    assert_eq!(report.low_completion_habits.len(), 1);
    assert_eq!(report.low_completion_habits[0].name, "Read");

    assert_eq!(report.top_skip_reasons[0].reason, SkipReason::Sick);
    assert_eq!(report.top_skip_reasons[0].count, 2);

    // Aug 1 2026 is a Saturday
    let saturday = report
        .day_of_week_patterns
        .iter()
        .find(|d| d.day == "Saturday")
        .unwrap();
    assert_eq!(saturday.total, 2);
    assert_eq!(saturday.completed, 1);
}

#[test]
fn test_report_window_excludes_old_records() {
    let mut c = coordinator();
    let run = add_template(&c, "Run", 50);

    c.complete_habit("user-1", &run, "2026-05-01", now()).unwrap();
    c.complete_habit("user-1", &run, "2026-08-04", now()).unwrap();

    let report = c.pattern_report("user-1", 30, today()).unwrap();
    assert_eq!(report.overall.total_records, 1);
}

#[test]
fn test_habit_history() {
    let mut c = coordinator();
    let run = add_template(&c, "Run", 50);
    let read = add_template(&c, "Read", 20);

    c.complete_habit("user-1", &run, "2026-08-01", now()).unwrap();
    c.complete_habit("user-1", &run, "2026-08-02", now()).unwrap();
    c.skip_habit("user-1", &run, "2026-08-03", SkipReason::Travel, now())
        .unwrap();
    c.complete_habit("user-1", &read, "2026-08-01", now()).unwrap();

    let history = c.habit_history("user-1", &run, 30, today()).unwrap();
    assert_eq!(history.name, "Run");
    assert_eq!(history.total_days, 3);
    assert_eq!(history.completed_days, 2);
    assert_eq!(history.skipped_days, 1);
    assert_eq!(history.completion_rate, 66.7);
    assert_eq!(history.records.len(), 3);
}

#[test]
fn test_history_checks_ownership() {
    let mut c = coordinator();
    let run = add_template(&c, "Run", 50);
    c.complete_habit("user-1", &run, "2026-08-01", now()).unwrap();

    assert!(c.habit_history("intruder", &run, 30, today()).is_err());
}

#[test]
fn test_weekly_totals_use_iso_weeks() {
    let mut c = coordinator();
    let run = add_template(&c, "Run", 50);

    // Saturday Aug 1 and Sunday Aug 2 share a Monday-start ISO week;
    // Monday Aug 3 starts the next one
    c.complete_habit("user-1", &run, "2026-08-01", now()).unwrap();
    c.complete_habit("user-1", &run, "2026-08-02", now()).unwrap();
    c.complete_habit("user-1", &run, "2026-08-03", now()).unwrap();

    let totals = c.weekly_totals("user-1", 30, today()).unwrap();
    assert_eq!(totals.len(), 2);
    assert_eq!(totals[0].iso_week + 1, totals[1].iso_week);
    assert_eq!(totals[0].completions, 2);
    assert_eq!(totals[1].completions, 1);

    // the Sunday-start week score sees those same days differently:
    // Aug 2 and 3 are in the current calendar week, Aug 1 is not
    let stats = c.user_stats("user-1").unwrap().unwrap();
    assert_eq!(stats.stats.week_score, 2);
}

#[test]
fn test_skipped_days_never_count_as_active() {
    let mut c = coordinator();
    let run = add_template(&c, "Run", 50);
    let read = add_template(&c, "Read", 20);

    // Aug 4: one skip, one completion -> still active via the completion
    c.skip_habit("user-1", &run, "2026-08-04", SkipReason::LowEnergy, now())
        .unwrap();
    c.complete_habit("user-1", &read, "2026-08-04", now()).unwrap();
    let outcome = c.complete_habit("user-1", &run, "2026-08-05", now()).unwrap();
    assert_eq!(outcome.stats.stats.current_streak, 2);

    // undoing the Aug 4 completion leaves only the skip; the walk from the
    // Aug 4 event date finds no active anchor
    c.complete_habit("user-1", &read, "2026-08-04", now()).unwrap();
    let stats = c.user_stats("user-1").unwrap().unwrap();
    assert_eq!(stats.stats.current_streak, 0);
}
