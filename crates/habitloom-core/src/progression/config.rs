//! Gamification constants.
//!
//! All progression tunables live in one immutable value object injected
//! into the calculators and the coordinator, so tests can vary them and
//! nothing reaches for ambient globals.

use serde::{Deserialize, Serialize};

/// Progression constants.
///
/// Overridable from the `[gamification]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamificationConfig {
    /// XP required per level
    #[serde(default = "default_xp_per_level")]
    pub xp_per_level: i64,
    /// Days in a scored week
    #[serde(default = "default_week_days")]
    pub week_days: u32,
    /// Streak freezes granted per calendar month
    #[serde(default = "default_monthly_freezes")]
    pub monthly_freezes: u8,
    /// How long one activated freeze protects the streak
    #[serde(default = "default_freeze_duration_hours")]
    pub freeze_duration_hours: i64,
    /// How long a freshly broken streak stays repairable
    #[serde(default = "default_repair_window_hours")]
    pub repair_window_hours: i64,
    /// Smallest allowed template XP value
    #[serde(default = "default_min_xp_value")]
    pub min_xp_value: i64,
    /// Largest allowed template XP value
    #[serde(default = "default_max_xp_value")]
    pub max_xp_value: i64,
}

fn default_xp_per_level() -> i64 {
    1000
}

fn default_week_days() -> u32 {
    7
}

fn default_monthly_freezes() -> u8 {
    2
}

fn default_freeze_duration_hours() -> i64 {
    24
}

fn default_repair_window_hours() -> i64 {
    48
}

fn default_min_xp_value() -> i64 {
    1
}

fn default_max_xp_value() -> i64 {
    10_000
}

impl Default for GamificationConfig {
    fn default() -> Self {
        Self {
            xp_per_level: default_xp_per_level(),
            week_days: default_week_days(),
            monthly_freezes: default_monthly_freezes(),
            freeze_duration_hours: default_freeze_duration_hours(),
            repair_window_hours: default_repair_window_hours(),
            min_xp_value: default_min_xp_value(),
            max_xp_value: default_max_xp_value(),
        }
    }
}

impl GamificationConfig {
    /// Validate a template XP value against the configured range.
    pub fn validate_xp_value(&self, value: i64) -> Result<(), crate::error::ValidationError> {
        if value < self.min_xp_value || value > self.max_xp_value {
            return Err(crate::error::ValidationError::XpOutOfRange {
                value,
                min: self.min_xp_value,
                max: self.max_xp_value,
            });
        }
        Ok(())
    }
}
