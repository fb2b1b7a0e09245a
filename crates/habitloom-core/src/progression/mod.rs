//! Habit progression engine.
//!
//! Converts completion events into XP, levels, streaks, and week scores.
//! The calculators ([`level`], [`streak`], [`week`]) are pure functions over
//! an injected [`GamificationConfig`]; the [`coordinator`] applies one event
//! (complete, skip, freeze) as a single atomic unit against storage.

pub mod config;
pub mod coordinator;
pub mod level;
pub mod streak;
pub mod week;

pub use config::GamificationConfig;
pub use coordinator::{CompletionOutcome, ProgressionCoordinator};
pub use level::LevelSnapshot;
pub use streak::{FreezeState, StreakWalk};
