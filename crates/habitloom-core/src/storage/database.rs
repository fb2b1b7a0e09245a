//! SQLite-based habit storage.
//!
//! Provides persistent storage for:
//! - Habit templates (definitions with XP values)
//! - The daily completion log, one row per (user, date, template)
//! - Per-user progression stats
//!
//! Callers that mutate the completion log and stats together wrap the
//! writes in `begin_immediate()`/`commit()` so both land as one unit and
//! concurrent writers are serialized.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::habit::{DailyHabitRecord, HabitTemplate, SkipReason, UserStats};
use crate::progression::GamificationConfig;

/// Partial update for a habit template.
///
/// `None` fields are left untouched. Updating `xp_value` never rewrites
/// `xp_earned` on past completion records.
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub subtitle: Option<String>,
    pub xp_value: Option<i64>,
    pub is_core: Option<bool>,
}

/// Summary of a full per-user data reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataResetSummary {
    pub deleted_records: usize,
    pub stats_reset: bool,
}

/// SQLite database for habit templates, the completion log, and stats.
pub struct HabitDb {
    conn: Connection,
}

const RECORD_COLUMNS: &str =
    "id, user_id, date, template_id, completed, skipped, skip_reason, xp_earned, completed_at, created_at";

const TEMPLATE_COLUMNS: &str =
    "id, user_id, category_id, name, subtitle, xp_value, is_core, display_order, created_at";

impl HabitDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/habitloom/habitloom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
            .join("habitloom.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        debug!(path = %path.display(), "opened habit database");
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS habit_templates (
                    id            TEXT PRIMARY KEY,
                    user_id       TEXT NOT NULL,
                    category_id   TEXT NOT NULL DEFAULT '',
                    name          TEXT NOT NULL,
                    subtitle      TEXT,
                    xp_value      INTEGER NOT NULL,
                    is_core       INTEGER NOT NULL DEFAULT 0,
                    display_order INTEGER NOT NULL DEFAULT 0,
                    created_at    TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_habits (
                    id           TEXT PRIMARY KEY,
                    user_id      TEXT NOT NULL,
                    date         TEXT NOT NULL,
                    template_id  TEXT NOT NULL,
                    completed    INTEGER NOT NULL DEFAULT 0,
                    skipped      INTEGER NOT NULL DEFAULT 0,
                    skip_reason  TEXT,
                    xp_earned    INTEGER NOT NULL DEFAULT 0,
                    completed_at TEXT,
                    created_at   TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_stats (
                    user_id             TEXT PRIMARY KEY,
                    total_xp            INTEGER NOT NULL DEFAULT 0,
                    level               INTEGER NOT NULL DEFAULT 0,
                    current_streak      INTEGER NOT NULL DEFAULT 0,
                    longest_streak      INTEGER NOT NULL DEFAULT 0,
                    week_score          INTEGER NOT NULL DEFAULT 0,
                    freezes_available   INTEGER NOT NULL DEFAULT 2,
                    freeze_active       INTEGER NOT NULL DEFAULT 0,
                    freeze_expires_at   TEXT,
                    last_freeze_used_at TEXT,
                    freeze_refill_month TEXT,
                    repair_window_end   TEXT,
                    updated_at          TEXT NOT NULL
                );

                -- one record per (user, date, template)
                CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_habits_key
                    ON daily_habits(user_id, date, template_id);

                -- Create indexes for common query patterns
                CREATE INDEX IF NOT EXISTS idx_daily_habits_user_date ON daily_habits(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_daily_habits_template ON daily_habits(template_id);
                CREATE INDEX IF NOT EXISTS idx_habit_templates_user ON habit_templates(user_id);
                CREATE INDEX IF NOT EXISTS idx_habit_templates_category ON habit_templates(category_id);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    // --- transactions -----------------------------------------------------

    /// Start an immediate transaction, taking the write lock up front.
    ///
    /// Serializes concurrent writers so no two can read the same stats
    /// snapshot and both write, each unaware of the other's delta.
    pub fn begin_immediate(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Roll back the open transaction. Errors are ignored: the connection
    /// rolls back anyway when the transaction is abandoned.
    pub fn rollback(&self) {
        let _ = self.conn.execute_batch("ROLLBACK");
    }

    // --- templates --------------------------------------------------------

    /// Create a habit template. The display order is appended at the end
    /// of the category.
    #[allow(clippy::too_many_arguments)]
    pub fn create_template(
        &self,
        config: &GamificationConfig,
        user_id: &str,
        category_id: &str,
        name: &str,
        subtitle: Option<&str>,
        xp_value: i64,
        is_core: bool,
        now: DateTime<Utc>,
    ) -> Result<HabitTemplate> {
        config.validate_xp_value(xp_value)?;
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".to_string(),
                message: "must not be empty".to_string(),
            }
            .into());
        }

        let max_order: Option<i64> = self.conn.query_row(
            "SELECT MAX(display_order) FROM habit_templates WHERE user_id = ?1 AND category_id = ?2",
            params![user_id, category_id],
            |row| row.get(0),
        )?;

        let template = HabitTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category_id: category_id.to_string(),
            name: name.to_string(),
            subtitle: subtitle.map(str::to_string),
            xp_value,
            is_core,
            order: max_order.unwrap_or(-1) + 1,
            created_at: now,
        };

        self.conn.execute(
            "INSERT INTO habit_templates (id, user_id, category_id, name, subtitle, xp_value, is_core, display_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                template.id,
                template.user_id,
                template.category_id,
                template.name,
                template.subtitle,
                template.xp_value,
                template.is_core,
                template.order,
                template.created_at,
            ],
        )?;
        Ok(template)
    }

    /// Fetch a template by id.
    pub fn get_template(&self, template_id: &str) -> Result<Option<HabitTemplate>> {
        let template = self
            .conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM habit_templates WHERE id = ?1"),
                params![template_id],
                template_from_row,
            )
            .optional()?;
        Ok(template)
    }

    /// Fetch a template, requiring it to exist and belong to `user_id`.
    pub fn require_template(&self, user_id: &str, template_id: &str) -> Result<HabitTemplate> {
        let template = self
            .get_template(template_id)?
            .ok_or_else(|| CoreError::NotFound {
                kind: "habit template",
                id: template_id.to_string(),
            })?;
        if template.user_id != user_id {
            return Err(CoreError::Unauthorized {
                kind: "habit template",
                id: template_id.to_string(),
            });
        }
        Ok(template)
    }

    /// Apply a partial update to a template owned by `user_id`.
    pub fn update_template(
        &self,
        config: &GamificationConfig,
        user_id: &str,
        template_id: &str,
        patch: TemplatePatch,
    ) -> Result<HabitTemplate> {
        let mut template = self.require_template(user_id, template_id)?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "name".to_string(),
                    message: "must not be empty".to_string(),
                }
                .into());
            }
            template.name = name;
        }
        if let Some(subtitle) = patch.subtitle {
            template.subtitle = Some(subtitle);
        }
        if let Some(xp_value) = patch.xp_value {
            config.validate_xp_value(xp_value)?;
            template.xp_value = xp_value;
        }
        if let Some(is_core) = patch.is_core {
            template.is_core = is_core;
        }

        self.conn.execute(
            "UPDATE habit_templates SET name = ?1, subtitle = ?2, xp_value = ?3, is_core = ?4 WHERE id = ?5",
            params![
                template.name,
                template.subtitle,
                template.xp_value,
                template.is_core,
                template.id,
            ],
        )?;
        Ok(template)
    }

    /// Delete a template owned by `user_id`. Past completion records keep
    /// their snapshotted XP.
    pub fn delete_template(&self, user_id: &str, template_id: &str) -> Result<()> {
        self.require_template(user_id, template_id)?;
        self.conn.execute(
            "DELETE FROM habit_templates WHERE id = ?1",
            params![template_id],
        )?;
        Ok(())
    }

    /// List templates for a user, optionally restricted to one category,
    /// in display order.
    pub fn list_templates(
        &self,
        user_id: &str,
        category_id: Option<&str>,
    ) -> Result<Vec<HabitTemplate>> {
        let mut templates = Vec::new();
        match category_id {
            Some(category) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {TEMPLATE_COLUMNS} FROM habit_templates
                     WHERE user_id = ?1 AND category_id = ?2
                     ORDER BY display_order"
                ))?;
                let rows = stmt.query_map(params![user_id, category], template_from_row)?;
                for row in rows {
                    templates.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {TEMPLATE_COLUMNS} FROM habit_templates
                     WHERE user_id = ?1
                     ORDER BY category_id, display_order"
                ))?;
                let rows = stmt.query_map(params![user_id], template_from_row)?;
                for row in rows {
                    templates.push(row?);
                }
            }
        }
        Ok(templates)
    }

    // --- daily records ----------------------------------------------------

    /// Fetch the record for one (user, date, template) key.
    pub fn get_daily_record(
        &self,
        user_id: &str,
        date: NaiveDate,
        template_id: &str,
    ) -> Result<Option<DailyHabitRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM daily_habits
                     WHERE user_id = ?1 AND date = ?2 AND template_id = ?3"
                ),
                params![user_id, date, template_id],
                record_from_row,
            )
            .optional()?;
        if let Some(record) = &record {
            record.check_invariants()?;
        }
        Ok(record)
    }

    /// Insert a freshly created record.
    pub fn insert_daily_record(&self, record: &DailyHabitRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO daily_habits (id, user_id, date, template_id, completed, skipped, skip_reason, xp_earned, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.user_id,
                record.date,
                record.template_id,
                record.completed,
                record.skipped,
                record.skip_reason.map(|r| r.as_str()),
                record.xp_earned,
                record.completed_at,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    /// Patch the mutable fields of an existing record.
    pub fn update_daily_record(&self, record: &DailyHabitRecord) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE daily_habits
             SET completed = ?1, skipped = ?2, skip_reason = ?3, xp_earned = ?4, completed_at = ?5
             WHERE id = ?6",
            params![
                record.completed,
                record.skipped,
                record.skip_reason.map(|r| r.as_str()),
                record.xp_earned,
                record.completed_at,
                record.id,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound {
                kind: "daily record",
                id: record.id.clone(),
            });
        }
        Ok(())
    }

    /// All records for one user and date.
    pub fn list_records_for_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<DailyHabitRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM daily_habits
             WHERE user_id = ?1 AND date = ?2
             ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![user_id, date], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            record.check_invariants()?;
            records.push(record);
        }
        Ok(records)
    }

    /// All records for one user on or after `since`, oldest first.
    pub fn list_completions_since(
        &self,
        user_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyHabitRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM daily_habits
             WHERE user_id = ?1 AND date >= ?2
             ORDER BY date"
        ))?;
        let rows = stmt.query_map(params![user_id, since], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            record.check_invariants()?;
            records.push(record);
        }
        Ok(records)
    }

    /// All records for one template on or after `since`, oldest first.
    pub fn list_template_records_since(
        &self,
        user_id: &str,
        template_id: &str,
        since: NaiveDate,
    ) -> Result<Vec<DailyHabitRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM daily_habits
             WHERE user_id = ?1 AND template_id = ?2 AND date >= ?3
             ORDER BY date"
        ))?;
        let rows = stmt.query_map(params![user_id, template_id, since], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            record.check_invariants()?;
            records.push(record);
        }
        Ok(records)
    }

    /// The set of dates with at least one completed habit for this user.
    pub fn active_dates(&self, user_id: &str) -> Result<BTreeSet<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT date FROM daily_habits WHERE user_id = ?1 AND completed = 1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, NaiveDate>(0))?;
        let mut dates = BTreeSet::new();
        for row in rows {
            dates.insert(row?);
        }
        Ok(dates)
    }

    // --- user stats -------------------------------------------------------

    /// Fetch the stats row for a user.
    pub fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let stats = self
            .conn
            .query_row(
                "SELECT user_id, total_xp, level, current_streak, longest_streak, week_score,
                        freezes_available, freeze_active, freeze_expires_at, last_freeze_used_at,
                        freeze_refill_month, repair_window_end, updated_at
                 FROM user_stats WHERE user_id = ?1",
                params![user_id],
                stats_from_row,
            )
            .optional()?;
        Ok(stats)
    }

    /// Insert or replace the stats row for a user.
    pub fn upsert_user_stats(&self, stats: &UserStats) -> Result<()> {
        self.conn.execute(
            "INSERT INTO user_stats (user_id, total_xp, level, current_streak, longest_streak, week_score,
                                     freezes_available, freeze_active, freeze_expires_at, last_freeze_used_at,
                                     freeze_refill_month, repair_window_end, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(user_id) DO UPDATE SET
                total_xp = excluded.total_xp,
                level = excluded.level,
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                week_score = excluded.week_score,
                freezes_available = excluded.freezes_available,
                freeze_active = excluded.freeze_active,
                freeze_expires_at = excluded.freeze_expires_at,
                last_freeze_used_at = excluded.last_freeze_used_at,
                freeze_refill_month = excluded.freeze_refill_month,
                repair_window_end = excluded.repair_window_end,
                updated_at = excluded.updated_at",
            params![
                stats.user_id,
                stats.total_xp,
                stats.level,
                stats.current_streak,
                stats.longest_streak,
                stats.week_score,
                stats.freezes_available,
                stats.freeze_active,
                stats.freeze_expires_at,
                stats.last_freeze_used_at,
                stats.freeze_refill_month,
                stats.repair_window_end,
                stats.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Delete all completion records for a user. Returns the number deleted.
    pub fn delete_user_records(&self, user_id: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM daily_habits WHERE user_id = ?1", params![user_id])?;
        Ok(deleted)
    }
}

fn template_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HabitTemplate> {
    Ok(HabitTemplate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        name: row.get(3)?,
        subtitle: row.get(4)?,
        xp_value: row.get(5)?,
        is_core: row.get(6)?,
        order: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyHabitRecord> {
    let skip_reason: Option<String> = row.get(6)?;
    let skip_reason = skip_reason
        .map(|raw| {
            raw.parse::<SkipReason>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()?;
    Ok(DailyHabitRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        template_id: row.get(3)?,
        completed: row.get(4)?,
        skipped: row.get(5)?,
        skip_reason,
        xp_earned: row.get(7)?,
        completed_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn stats_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserStats> {
    Ok(UserStats {
        user_id: row.get(0)?,
        total_xp: row.get(1)?,
        level: row.get(2)?,
        current_streak: row.get(3)?,
        longest_streak: row.get(4)?,
        week_score: row.get(5)?,
        freezes_available: row.get(6)?,
        freeze_active: row.get(7)?,
        freeze_expires_at: row.get(8)?,
        last_freeze_used_at: row.get(9)?,
        freeze_refill_month: row.get(10)?,
        repair_window_end: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
