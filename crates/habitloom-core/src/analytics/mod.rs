//! Completion-pattern analytics.
//!
//! Read-only aggregations over a fetched window of completion records:
//! per-habit completion rates, most common skip reasons, day-of-week
//! breakdowns, and per-ISO-week totals. Pure reducers with no state-machine
//! behavior; callers fetch the window and hand it over.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::habit::{DailyHabitRecord, HabitTemplate, SkipReason};
use crate::progression::week::iso_year_week;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Analyzed window boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_analyzed: i64,
}

/// Totals across every record in the window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_records: u32,
    pub completed: u32,
    pub skipped: u32,
    /// Percent of records completed (0.0 to 100.0)
    pub completion_rate: f64,
}

/// Per-template performance within the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePerformance {
    pub template_id: String,
    pub name: String,
    pub xp_value: i64,
    pub total: u32,
    pub completed: u32,
    pub skipped: u32,
    /// Percent of this template's records completed
    pub completion_rate: f64,
}

/// A habit the user is struggling with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowCompletionHabit {
    pub name: String,
    pub completion_rate: f64,
}

/// Grouped count of one skip reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipReasonCount {
    pub reason: SkipReason,
    pub count: u32,
}

/// Completion behavior for one weekday across the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayOfWeekStats {
    pub day: String,
    pub total: u32,
    pub completed: u32,
    pub completion_rate: f64,
}

/// Completions grouped by Monday-start ISO week.
///
/// This grouping deliberately uses the ISO convention; the week *score*
/// uses Sunday-start calendar weeks and the two must stay separate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTotal {
    pub iso_year: i32,
    pub iso_week: u32,
    pub completions: u32,
    pub active_days: u32,
}

/// Full pattern-intelligence report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReport {
    pub period: ReportPeriod,
    pub overall: OverallStats,
    /// Worst-first, so struggling habits surface on top
    pub habit_performance: Vec<TemplatePerformance>,
    pub low_completion_habits: Vec<LowCompletionHabit>,
    pub top_skip_reasons: Vec<SkipReasonCount>,
    pub day_of_week_patterns: Vec<DayOfWeekStats>,
    pub recommendations: Vec<String>,
}

/// History of one habit over a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitHistory {
    pub template_id: String,
    pub name: String,
    pub completed_days: u32,
    pub skipped_days: u32,
    pub total_days: u32,
    pub completion_rate: f64,
    pub records: Vec<DailyHabitRecord>,
}

/// Analyzer for completion patterns.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    /// Completion percent below which a habit counts as struggling
    pub low_completion_threshold: f64,
    /// How many struggling habits to surface
    pub max_low_completion: usize,
    /// How many skip reasons to surface
    pub max_skip_reasons: usize,
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self {
            low_completion_threshold: 30.0,
            max_low_completion: 5,
            max_skip_reasons: 3,
        }
    }
}

impl PatternAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the full pattern report for one window of records.
    pub fn pattern_report(
        &self,
        templates: &[HabitTemplate],
        records: &[DailyHabitRecord],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> PatternReport {
        let overall = overall_stats(records);
        let habit_performance = self.habit_performance(templates, records);
        let low_completion_habits = self.low_completion(&habit_performance);
        let top_skip_reasons = self.top_skip_reasons(records);
        let day_of_week_patterns = day_of_week_patterns(records);
        let recommendations = self.recommendations(
            &habit_performance,
            &low_completion_habits,
            &top_skip_reasons,
        );

        PatternReport {
            period: ReportPeriod {
                start_date,
                end_date,
                days_analyzed: (end_date - start_date).num_days(),
            },
            overall,
            habit_performance,
            low_completion_habits,
            top_skip_reasons,
            day_of_week_patterns,
            recommendations,
        }
    }

    /// History summary for one template.
    pub fn habit_history(
        &self,
        template: &HabitTemplate,
        records: Vec<DailyHabitRecord>,
    ) -> HabitHistory {
        let completed_days = records.iter().filter(|r| r.completed).count() as u32;
        let skipped_days = records.iter().filter(|r| r.skipped).count() as u32;
        let total_days = records.len() as u32;
        HabitHistory {
            template_id: template.id.clone(),
            name: template.name.clone(),
            completed_days,
            skipped_days,
            total_days,
            completion_rate: rate(completed_days, total_days),
            records,
        }
    }

    /// Completions per ISO week, oldest week first.
    pub fn weekly_totals(&self, records: &[DailyHabitRecord]) -> Vec<WeeklyTotal> {
        let mut completions: HashMap<(i32, u32), u32> = HashMap::new();
        let mut days: HashMap<(i32, u32), std::collections::BTreeSet<NaiveDate>> = HashMap::new();

        for record in records.iter().filter(|r| r.completed) {
            let key = iso_year_week(record.date);
            *completions.entry(key).or_default() += 1;
            days.entry(key).or_default().insert(record.date);
        }

        let mut totals: Vec<WeeklyTotal> = completions
            .into_iter()
            .map(|((iso_year, iso_week), count)| WeeklyTotal {
                iso_year,
                iso_week,
                completions: count,
                active_days: days
                    .get(&(iso_year, iso_week))
                    .map(|set| set.len() as u32)
                    .unwrap_or(0),
            })
            .collect();
        totals.sort_by_key(|t| (t.iso_year, t.iso_week));
        totals
    }

    fn habit_performance(
        &self,
        templates: &[HabitTemplate],
        records: &[DailyHabitRecord],
    ) -> Vec<TemplatePerformance> {
        let mut performance: Vec<TemplatePerformance> = templates
            .iter()
            .map(|template| {
                let entries: Vec<_> = records
                    .iter()
                    .filter(|r| r.template_id == template.id)
                    .collect();
                let completed = entries.iter().filter(|r| r.completed).count() as u32;
                let skipped = entries.iter().filter(|r| r.skipped).count() as u32;
                let total = entries.len() as u32;
                TemplatePerformance {
                    template_id: template.id.clone(),
                    name: template.name.clone(),
                    xp_value: template.xp_value,
                    total,
                    completed,
                    skipped,
                    completion_rate: rate(completed, total),
                }
            })
            .collect();

        // worst first; name as tie-break keeps output stable
        performance.sort_by(|a, b| {
            a.completion_rate
                .partial_cmp(&b.completion_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        performance
    }

    fn low_completion(&self, performance: &[TemplatePerformance]) -> Vec<LowCompletionHabit> {
        performance
            .iter()
            .filter(|p| p.total > 0 && p.completion_rate < self.low_completion_threshold)
            .take(self.max_low_completion)
            .map(|p| LowCompletionHabit {
                name: p.name.clone(),
                completion_rate: p.completion_rate,
            })
            .collect()
    }

    fn top_skip_reasons(&self, records: &[DailyHabitRecord]) -> Vec<SkipReasonCount> {
        let mut counts: HashMap<SkipReason, u32> = HashMap::new();
        for record in records.iter().filter(|r| r.skipped) {
            if let Some(reason) = record.skip_reason {
                *counts.entry(reason).or_default() += 1;
            }
        }
        let mut reasons: Vec<SkipReasonCount> = counts
            .into_iter()
            .map(|(reason, count)| SkipReasonCount { reason, count })
            .collect();
        reasons.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.reason.as_str().cmp(b.reason.as_str()))
        });
        reasons.truncate(self.max_skip_reasons);
        reasons
    }

    fn recommendations(
        &self,
        performance: &[TemplatePerformance],
        low: &[LowCompletionHabit],
        skip_reasons: &[SkipReasonCount],
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if let Some(worst) = low.first() {
            recommendations.push(format!(
                "\"{}\" only completed {:.0}% of the time. Consider breaking it down or reducing its XP to make it less intimidating.",
                worst.name, worst.completion_rate
            ));
        }

        if let Some(top) = skip_reasons.first() {
            recommendations.push(format!(
                "Most common skip reason: \"{}\" ({}x). Try adjusting your schedule or habit timing.",
                top.reason, top.count
            ));
        }

        let rated: Vec<_> = performance.iter().filter(|p| p.total > 0).collect();
        if !rated.is_empty() {
            let avg = rated.iter().map(|p| p.completion_rate).sum::<f64>() / rated.len() as f64;
            if avg < 50.0 {
                recommendations.push(
                    "Your overall completion rate is below 50%. Consider focusing on fewer habits to build consistency.".to_string(),
                );
            } else if avg >= 80.0 {
                recommendations.push(
                    "You're maintaining an 80%+ completion rate. Consider adding more challenging habits.".to_string(),
                );
            }
        }

        recommendations
    }
}

fn overall_stats(records: &[DailyHabitRecord]) -> OverallStats {
    let completed = records.iter().filter(|r| r.completed).count() as u32;
    let skipped = records.iter().filter(|r| r.skipped).count() as u32;
    let total = records.len() as u32;
    OverallStats {
        total_records: total,
        completed,
        skipped,
        completion_rate: rate(completed, total),
    }
}

fn day_of_week_patterns(records: &[DailyHabitRecord]) -> Vec<DayOfWeekStats> {
    let mut totals = [0u32; 7];
    let mut completed = [0u32; 7];
    for record in records {
        let index = record.date.weekday().num_days_from_sunday() as usize;
        totals[index] += 1;
        if record.completed {
            completed[index] += 1;
        }
    }
    DAY_NAMES
        .iter()
        .enumerate()
        .map(|(index, day)| DayOfWeekStats {
            day: day.to_string(),
            total: totals[index],
            completed: completed[index],
            completion_rate: rate(completed[index], totals[index]),
        })
        .collect()
}

fn rate(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = completed as f64 / total as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    fn template(id: &str, name: &str, xp: i64) -> HabitTemplate {
        HabitTemplate {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            category_id: "health".to_string(),
            name: name.to_string(),
            subtitle: None,
            xp_value: xp,
            is_core: false,
            order: 0,
            created_at: Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
        }
    }

    fn record(template_id: &str, d: u32, completed: bool, skip: Option<SkipReason>) -> DailyHabitRecord {
        let now = Utc.with_ymd_and_hms(2026, 8, d, 8, 0, 0).unwrap();
        DailyHabitRecord {
            id: format!("{template_id}-{d}"),
            user_id: "user-1".to_string(),
            date: day(d),
            template_id: template_id.to_string(),
            completed,
            skipped: skip.is_some(),
            skip_reason: skip,
            xp_earned: if completed { 10 } else { 0 },
            completed_at: completed.then_some(now),
            created_at: now,
        }
    }

    #[test]
    fn test_overall_and_per_template_rates() {
        let templates = vec![template("tpl-1", "Run", 50), template("tpl-2", "Read", 20)];
        let records = vec![
            record("tpl-1", 1, true, None),
            record("tpl-1", 2, true, None),
            record("tpl-1", 3, false, Some(SkipReason::Sick)),
            record("tpl-2", 1, false, Some(SkipReason::NoTime)),
        ];

        let report =
            PatternAnalyzer::default().pattern_report(&templates, &records, day(1), day(7));
        assert_eq!(report.overall.total_records, 4);
        assert_eq!(report.overall.completed, 2);
        assert_eq!(report.overall.skipped, 2);
        assert_eq!(report.overall.completion_rate, 50.0);

        // worst first: Read (0%) before Run (66.7%)
        assert_eq!(report.habit_performance[0].name, "Read");
        assert_eq!(report.habit_performance[1].name, "Run");
        assert_eq!(report.habit_performance[1].completion_rate, 66.7);
    }

    #[test]
    fn test_low_completion_filter() {
        let templates = vec![template("tpl-1", "Run", 50), template("tpl-2", "Read", 20)];
        let records = vec![
            record("tpl-1", 1, true, None),
            record("tpl-2", 1, false, None),
            record("tpl-2", 2, false, None),
        ];
        let report =
            PatternAnalyzer::default().pattern_report(&templates, &records, day(1), day(7));
        assert_eq!(report.low_completion_habits.len(), 1);
        assert_eq!(report.low_completion_habits[0].name, "Read");
    }

    #[test]
    fn test_top_skip_reasons_sorted_and_truncated() {
        let templates = vec![template("tpl-1", "Run", 50)];
        let records = vec![
            record("tpl-1", 1, false, Some(SkipReason::Sick)),
            record("tpl-1", 2, false, Some(SkipReason::Sick)),
            record("tpl-1", 3, false, Some(SkipReason::NoTime)),
            record("tpl-1", 4, false, Some(SkipReason::Travel)),
            record("tpl-1", 5, false, Some(SkipReason::Forgot)),
        ];
        let report =
            PatternAnalyzer::default().pattern_report(&templates, &records, day(1), day(7));
        assert_eq!(report.top_skip_reasons.len(), 3);
        assert_eq!(report.top_skip_reasons[0].reason, SkipReason::Sick);
        assert_eq!(report.top_skip_reasons[0].count, 2);
    }

    #[test]
    fn test_day_of_week_grouping() {
        let templates = vec![template("tpl-1", "Run", 50)];
        // 2026-08-02 and 2026-08-09 are Sundays
        let records = vec![
            record("tpl-1", 2, true, None),
            record("tpl-1", 9, false, None),
            record("tpl-1", 3, true, None),
        ];
        let report =
            PatternAnalyzer::default().pattern_report(&templates, &records, day(1), day(10));
        let sunday = &report.day_of_week_patterns[0];
        assert_eq!(sunday.day, "Sunday");
        assert_eq!(sunday.total, 2);
        assert_eq!(sunday.completed, 1);
        assert_eq!(sunday.completion_rate, 50.0);
        let monday = &report.day_of_week_patterns[1];
        assert_eq!(monday.total, 1);
        assert_eq!(monday.completed, 1);
    }

    #[test]
    fn test_recommendations_mention_worst_habit_and_reason() {
        let templates = vec![template("tpl-1", "Meditate", 30)];
        let records = vec![
            record("tpl-1", 1, false, Some(SkipReason::LowEnergy)),
            record("tpl-1", 2, false, Some(SkipReason::LowEnergy)),
            record("tpl-1", 3, true, None),
        ];
        let report =
            PatternAnalyzer::default().pattern_report(&templates, &records, day(1), day(7));
        assert!(report.recommendations.iter().any(|r| r.contains("Meditate")));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("low_energy")));
        // 33% average also triggers the consistency nudge
        assert!(report.recommendations.iter().any(|r| r.contains("below 50%")));
    }

    #[test]
    fn test_empty_window() {
        let report = PatternAnalyzer::default().pattern_report(&[], &[], day(1), day(7));
        assert_eq!(report.overall.total_records, 0);
        assert_eq!(report.overall.completion_rate, 0.0);
        assert!(report.habit_performance.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_weekly_totals_iso_grouping() {
        // Sunday 2026-08-02 groups with the preceding Monday-start ISO week,
        // not with Monday 2026-08-03
        let records = vec![
            record("tpl-1", 1, true, None),
            record("tpl-1", 2, true, None),
            record("tpl-1", 3, true, None),
        ];
        let totals = PatternAnalyzer::default().weekly_totals(&records);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].completions, 2);
        assert_eq!(totals[0].active_days, 2);
        assert_eq!(totals[1].completions, 1);
    }

    #[test]
    fn test_history_summary() {
        let tpl = template("tpl-1", "Run", 50);
        let records = vec![
            record("tpl-1", 1, true, None),
            record("tpl-1", 2, false, Some(SkipReason::Sick)),
        ];
        let history = PatternAnalyzer::default().habit_history(&tpl, records);
        assert_eq!(history.completed_days, 1);
        assert_eq!(history.skipped_days, 1);
        assert_eq!(history.total_days, 2);
        assert_eq!(history.completion_rate, 50.0);
    }
}
