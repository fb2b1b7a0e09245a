//! Per-event orchestration of the completion log and user stats.
//!
//! Every operation that touches the log also recomputes XP, level, streak,
//! and week score from the updated log and persists both inside one
//! immediate SQLite transaction. A reader can never observe a record write
//! without the matching stats write, and concurrent writers for the same
//! user are serialized by the write lock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::GamificationConfig;
use super::level::LevelSnapshot;
use super::streak::{self, FreezeState};
use super::week;
use crate::analytics::{HabitHistory, PatternAnalyzer, PatternReport, WeeklyTotal};
use crate::error::{CoreError, Result, ValidationError};
use crate::habit::{
    parse_day, DailyHabitRecord, FreezeStatus, HabitTemplate, RecordState, SkipReason,
    StatsSnapshot, UserStats,
};
use crate::storage::{DataResetSummary, HabitDb};

/// Result of one completion or skip event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    /// The record after the transition
    pub record: DailyHabitRecord,
    /// XP applied by this event (negative for an undo)
    pub xp_delta: i64,
    /// Stats after the recompute
    pub stats: StatsSnapshot,
}

/// Orchestrates habit events against storage.
pub struct ProgressionCoordinator {
    db: HabitDb,
    config: GamificationConfig,
}

impl ProgressionCoordinator {
    /// Create a coordinator with default gamification constants.
    pub fn new(db: HabitDb) -> Self {
        Self::with_config(db, GamificationConfig::default())
    }

    /// Create a coordinator with custom constants.
    pub fn with_config(db: HabitDb, config: GamificationConfig) -> Self {
        Self { db, config }
    }

    pub fn db(&self) -> &HabitDb {
        &self.db
    }

    pub fn config(&self) -> &GamificationConfig {
        &self.config
    }

    /// Complete a habit for a date, or toggle an existing completion off.
    ///
    /// - No record yet: create it completed, award the template's XP.
    /// - Record completed: toggle off as an undo, withdraw the XP.
    /// - Record uncompleted or skipped: complete it (clearing any skip)
    ///   and award the XP.
    ///
    /// # Errors
    /// `NotFound`/`Unauthorized` for a bad template reference,
    /// `Validation` for an unparsable date, `Database` on store failure.
    pub fn complete_habit(
        &mut self,
        user_id: &str,
        template_id: &str,
        date: &str,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let day = parse_day(date)?;
        let template = self.db.require_template(user_id, template_id)?;

        self.db.begin_immediate()?;
        match self.toggle_completion_tx(user_id, &template, day, now) {
            Ok(outcome) => {
                self.db.commit()?;
                debug!(
                    user = user_id,
                    template = template_id,
                    date,
                    xp_delta = outcome.xp_delta,
                    streak = outcome.stats.stats.current_streak,
                    "habit completion toggled"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.db.rollback();
                Err(e)
            }
        }
    }

    /// Skip a habit for a date with a reason.
    ///
    /// Withdraws XP only if the record was previously completed; skipping
    /// never awards anything. The day drops out of the active set unless
    /// another completed habit keeps it active.
    pub fn skip_habit(
        &mut self,
        user_id: &str,
        template_id: &str,
        date: &str,
        reason: SkipReason,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let day = parse_day(date)?;
        let template = self.db.require_template(user_id, template_id)?;

        self.db.begin_immediate()?;
        match self.apply_skip_tx(user_id, &template, day, reason, now) {
            Ok(outcome) => {
                self.db.commit()?;
                debug!(
                    user = user_id,
                    template = template_id,
                    date,
                    reason = %reason,
                    "habit skipped"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.db.rollback();
                Err(e)
            }
        }
    }

    /// Create the stats row for a user if it does not exist yet.
    pub fn initialize_user_stats(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserStats> {
        if let Some(stats) = self.db.get_user_stats(user_id)? {
            return Ok(stats);
        }
        let stats = UserStats::new(user_id, self.config.monthly_freezes, now);
        self.db.upsert_user_stats(&stats)?;
        debug!(user = user_id, "initialized user stats");
        Ok(stats)
    }

    /// Current stats with derived level progress, if the user has any.
    pub fn user_stats(&self, user_id: &str) -> Result<Option<StatsSnapshot>> {
        Ok(self
            .db
            .get_user_stats(user_id)?
            .map(|stats| self.snapshot(stats)))
    }

    /// Activate a streak freeze: 24 hours of protection, at most one
    /// active at a time, drawn from the monthly allowance.
    pub fn use_streak_freeze(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<FreezeStatus> {
        self.db.begin_immediate()?;
        match self.use_freeze_tx(user_id, now) {
            Ok(status) => {
                self.db.commit()?;
                debug!(
                    user = user_id,
                    remaining = status.freezes_available,
                    "streak freeze activated"
                );
                Ok(status)
            }
            Err(e) => {
                self.db.rollback();
                Err(e)
            }
        }
    }

    /// Streak-protection status, applying the lazy monthly refill and
    /// lapsing an expired freeze.
    pub fn freeze_status(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<FreezeStatus> {
        let mut stats = self
            .db
            .get_user_stats(user_id)?
            .unwrap_or_else(|| UserStats::new(user_id, self.config.monthly_freezes, now));
        let before = (
            stats.freezes_available,
            stats.freeze_active,
            stats.freeze_refill_month.clone(),
        );
        self.refresh_protection(&mut stats, now);
        let after = (
            stats.freezes_available,
            stats.freeze_active,
            stats.freeze_refill_month.clone(),
        );
        if before != after {
            stats.updated_at = now;
            self.db.upsert_user_stats(&stats)?;
        }
        Ok(freeze_status_of(&stats, now))
    }

    /// Delete the user's completion log and zero their progression totals.
    pub fn reset_all_data(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<DataResetSummary> {
        self.db.begin_immediate()?;
        match self.reset_tx(user_id, now) {
            Ok(summary) => {
                self.db.commit()?;
                debug!(
                    user = user_id,
                    deleted = summary.deleted_records,
                    "reset all habit data"
                );
                Ok(summary)
            }
            Err(e) => {
                self.db.rollback();
                Err(e)
            }
        }
    }

    // --- analytics passthrough --------------------------------------------

    /// Pattern report over the trailing `days_back` window ending `today`.
    pub fn pattern_report(
        &self,
        user_id: &str,
        days_back: u32,
        today: NaiveDate,
    ) -> Result<PatternReport> {
        let start = today - Duration::days(days_back as i64);
        let templates = self.db.list_templates(user_id, None)?;
        let records = self.db.list_completions_since(user_id, start)?;
        Ok(PatternAnalyzer::default().pattern_report(&templates, &records, start, today))
    }

    /// History for one template over the trailing `days_back` window.
    pub fn habit_history(
        &self,
        user_id: &str,
        template_id: &str,
        days_back: u32,
        today: NaiveDate,
    ) -> Result<HabitHistory> {
        let template = self.db.require_template(user_id, template_id)?;
        let start = today - Duration::days(days_back as i64);
        let records = self
            .db
            .list_template_records_since(user_id, template_id, start)?;
        Ok(PatternAnalyzer::default().habit_history(&template, records))
    }

    /// Completions per ISO week over the trailing `days_back` window.
    pub fn weekly_totals(
        &self,
        user_id: &str,
        days_back: u32,
        today: NaiveDate,
    ) -> Result<Vec<WeeklyTotal>> {
        let start = today - Duration::days(days_back as i64);
        let records = self.db.list_completions_since(user_id, start)?;
        Ok(PatternAnalyzer::default().weekly_totals(&records))
    }

    // --- transaction bodies -----------------------------------------------

    fn toggle_completion_tx(
        &self,
        user_id: &str,
        template: &HabitTemplate,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let existing = self.db.get_daily_record(user_id, day, &template.id)?;
        let (record, xp_delta) = match existing {
            None => {
                let record = DailyHabitRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    date: day,
                    template_id: template.id.clone(),
                    completed: true,
                    skipped: false,
                    skip_reason: None,
                    xp_earned: template.xp_value,
                    completed_at: Some(now),
                    created_at: now,
                };
                self.db.insert_daily_record(&record)?;
                (record, template.xp_value)
            }
            Some(mut record) => {
                let target = if record.completed {
                    RecordState::Uncompleted
                } else {
                    RecordState::Completed
                };
                check_transition(&record, target)?;
                if record.completed {
                    // undo, not a skip
                    record.completed = false;
                    record.skipped = false;
                    record.skip_reason = None;
                    record.xp_earned = 0;
                    record.completed_at = None;
                    self.db.update_daily_record(&record)?;
                    (record, -template.xp_value)
                } else {
                    record.completed = true;
                    record.skipped = false;
                    record.skip_reason = None;
                    record.xp_earned = template.xp_value;
                    record.completed_at = Some(now);
                    self.db.update_daily_record(&record)?;
                    (record, template.xp_value)
                }
            }
        };
        let stats = self.recompute_stats(user_id, day, xp_delta, now)?;
        Ok(CompletionOutcome {
            record,
            xp_delta,
            stats,
        })
    }

    fn apply_skip_tx(
        &self,
        user_id: &str,
        template: &HabitTemplate,
        day: NaiveDate,
        reason: SkipReason,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome> {
        let existing = self.db.get_daily_record(user_id, day, &template.id)?;
        let (record, xp_delta) = match existing {
            None => {
                let record = DailyHabitRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    date: day,
                    template_id: template.id.clone(),
                    completed: false,
                    skipped: true,
                    skip_reason: Some(reason),
                    xp_earned: 0,
                    completed_at: None,
                    created_at: now,
                };
                self.db.insert_daily_record(&record)?;
                (record, 0)
            }
            Some(mut record) => {
                check_transition(&record, RecordState::Skipped)?;
                let xp_delta = if record.completed {
                    -template.xp_value
                } else {
                    0
                };
                record.completed = false;
                record.skipped = true;
                record.skip_reason = Some(reason);
                record.xp_earned = 0;
                record.completed_at = None;
                self.db.update_daily_record(&record)?;
                (record, xp_delta)
            }
        };
        let stats = self.recompute_stats(user_id, day, xp_delta, now)?;
        Ok(CompletionOutcome {
            record,
            xp_delta,
            stats,
        })
    }

    fn use_freeze_tx(&self, user_id: &str, now: DateTime<Utc>) -> Result<FreezeStatus> {
        let mut stats = self
            .db
            .get_user_stats(user_id)?
            .unwrap_or_else(|| UserStats::new(user_id, self.config.monthly_freezes, now));
        self.refresh_protection(&mut stats, now);

        if stats.freeze_is_active(now) {
            return Err(ValidationError::InvalidValue {
                field: "freeze".to_string(),
                message: "a streak freeze is already active".to_string(),
            }
            .into());
        }
        if stats.freezes_available == 0 {
            return Err(ValidationError::InvalidValue {
                field: "freeze".to_string(),
                message: "no streak freezes available this month".to_string(),
            }
            .into());
        }

        stats.freezes_available -= 1;
        stats.freeze_active = true;
        stats.freeze_expires_at = Some(now + Duration::hours(self.config.freeze_duration_hours));
        stats.last_freeze_used_at = Some(now);
        stats.updated_at = now;
        self.db.upsert_user_stats(&stats)?;
        Ok(freeze_status_of(&stats, now))
    }

    fn reset_tx(&self, user_id: &str, now: DateTime<Utc>) -> Result<DataResetSummary> {
        let deleted_records = self.db.delete_user_records(user_id)?;
        let stats_reset = match self.db.get_user_stats(user_id)? {
            Some(mut stats) => {
                stats.total_xp = 0;
                stats.level = 0;
                stats.current_streak = 0;
                stats.longest_streak = 0;
                stats.week_score = 0;
                stats.repair_window_end = None;
                stats.updated_at = now;
                self.db.upsert_user_stats(&stats)?;
                true
            }
            None => false,
        };
        Ok(DataResetSummary {
            deleted_records,
            stats_reset,
        })
    }

    // --- internals --------------------------------------------------------

    /// Recompute every derived stat from the updated log and persist.
    /// Runs inside the caller's transaction.
    fn recompute_stats(
        &self,
        user_id: &str,
        event_date: NaiveDate,
        xp_delta: i64,
        now: DateTime<Utc>,
    ) -> Result<StatsSnapshot> {
        let mut stats = self
            .db
            .get_user_stats(user_id)?
            .unwrap_or_else(|| UserStats::new(user_id, self.config.monthly_freezes, now));
        self.refresh_protection(&mut stats, now);

        stats.total_xp += xp_delta;
        stats.level = super::level::level(stats.total_xp, &self.config);

        let active = self.db.active_dates(user_id)?;
        let walk = streak::walk_streak(&active, event_date, FreezeState::from_stats(&stats), now);
        let previous_streak = stats.current_streak;
        stats.current_streak = walk.current_streak;
        stats.longest_streak = stats.longest_streak.max(walk.current_streak);
        if walk.current_streak < previous_streak && previous_streak >= 2 {
            // a real streak just broke; give the user a window to rescue it
            stats.repair_window_end = Some(now + Duration::hours(self.config.repair_window_hours));
        }

        stats.week_score = week::calendar_week_score(&active, event_date, self.config.week_days);
        stats.updated_at = now;
        self.db.upsert_user_stats(&stats)?;
        Ok(self.snapshot(stats))
    }

    /// Lazy upkeep of the freeze fields: refill the monthly allowance when
    /// the month rolls over, lapse an expired freeze.
    fn refresh_protection(&self, stats: &mut UserStats, now: DateTime<Utc>) {
        let month = now.format("%Y-%m").to_string();
        if stats.freeze_refill_month.as_deref() != Some(month.as_str()) {
            stats.freezes_available = self.config.monthly_freezes;
            stats.freeze_refill_month = Some(month);
        }
        if stats.freeze_active && !stats.freeze_is_active(now) {
            stats.freeze_active = false;
        }
    }

    fn snapshot(&self, stats: UserStats) -> StatsSnapshot {
        let level = LevelSnapshot::of(stats.total_xp, &self.config);
        StatsSnapshot {
            stats,
            xp_for_next_level: level.xp_for_next_level,
            current_level_progress: level.current_level_progress,
        }
    }
}

/// Reject a transition the state machine does not allow. Cannot fire for a
/// record that went through this coordinator; a hit means corrupted data.
fn check_transition(record: &DailyHabitRecord, to: RecordState) -> Result<()> {
    let from = record.state();
    if !from.can_transition_to(&to) {
        return Err(CoreError::InvariantViolation(format!(
            "record {}: invalid transition {from:?} -> {to:?}",
            record.id
        )));
    }
    Ok(())
}

fn freeze_status_of(stats: &UserStats, now: DateTime<Utc>) -> FreezeStatus {
    FreezeStatus {
        active: stats.freeze_is_active(now),
        expires_at: stats
            .freeze_expires_at
            .filter(|_| stats.freeze_is_active(now)),
        freezes_available: stats.freezes_available,
        repair_window_end: stats.repair_window_end.filter(|end| *end > now),
    }
}
