//! XP-to-level conversion.
//!
//! Pure, total functions. `total_xp` can transiently be negative (template
//! XP edits racing an undo); level is still the floor of the division and
//! is never clamped, so a negative input yields a negative level.

use serde::{Deserialize, Serialize};

use super::config::GamificationConfig;

/// Level reached at `total_xp`.
pub fn level(total_xp: i64, config: &GamificationConfig) -> i64 {
    // div_euclid floors for negative values; plain `/` truncates toward zero
    total_xp.div_euclid(config.xp_per_level)
}

/// XP still needed to reach the next level.
pub fn xp_for_next_level(total_xp: i64, config: &GamificationConfig) -> i64 {
    (level(total_xp, config) + 1) * config.xp_per_level - total_xp
}

/// XP accumulated within the current level (0..xp_per_level).
pub fn level_progress(total_xp: i64, config: &GamificationConfig) -> i64 {
    total_xp.rem_euclid(config.xp_per_level)
}

/// Derived level values for one XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub level: i64,
    pub xp_for_next_level: i64,
    pub current_level_progress: i64,
}

impl LevelSnapshot {
    pub fn of(total_xp: i64, config: &GamificationConfig) -> Self {
        Self {
            level: level(total_xp, config),
            xp_for_next_level: xp_for_next_level(total_xp, config),
            current_level_progress: level_progress(total_xp, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> GamificationConfig {
        GamificationConfig::default()
    }

    #[test]
    fn test_level_boundaries() {
        let c = config();
        assert_eq!(level(0, &c), 0);
        assert_eq!(level(999, &c), 0);
        assert_eq!(level(1000, &c), 1);
        assert_eq!(level(2500, &c), 2);
    }

    #[test]
    fn test_xp_for_next_level() {
        let c = config();
        assert_eq!(xp_for_next_level(0, &c), 1000);
        assert_eq!(xp_for_next_level(2500, &c), 500);
        assert_eq!(xp_for_next_level(999, &c), 1);
    }

    #[test]
    fn test_negative_xp_is_not_clamped() {
        let c = config();
        assert_eq!(level(-1, &c), -1);
        assert_eq!(level(-500, &c), -1);
        assert_eq!(level(-1000, &c), -1);
        assert_eq!(level(-1001, &c), -2);
        // progress stays within the level even below zero
        assert_eq!(level_progress(-500, &c), 500);
    }

    #[test]
    fn test_snapshot() {
        let snapshot = LevelSnapshot::of(2500, &config());
        assert_eq!(snapshot.level, 2);
        assert_eq!(snapshot.xp_for_next_level, 500);
        assert_eq!(snapshot.current_level_progress, 500);
    }

    #[test]
    fn test_custom_xp_per_level() {
        let c = GamificationConfig {
            xp_per_level: 250,
            ..GamificationConfig::default()
        };
        assert_eq!(level(500, &c), 2);
        assert_eq!(xp_for_next_level(600, &c), 150);
    }

    proptest! {
        #[test]
        fn prop_level_monotonic(x in -1_000_000i64..1_000_000) {
            let c = config();
            prop_assert!(level(x, &c) <= level(x + 1, &c));
        }

        #[test]
        fn prop_progress_in_range(x in -1_000_000i64..1_000_000) {
            let c = config();
            let progress = level_progress(x, &c);
            prop_assert!((0..c.xp_per_level).contains(&progress));
            // level * per_level + progress reassembles the total
            prop_assert_eq!(level(x, &c) * c.xp_per_level + progress, x);
        }
    }
}
