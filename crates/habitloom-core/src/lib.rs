//! # Habitloom Core Library
//!
//! This library provides the core business logic for the Habitloom habit
//! dashboard. It implements a CLI-first philosophy where all operations are
//! available via a standalone CLI binary, with any GUI being a thin layer
//! over the same core library.
//!
//! ## Architecture
//!
//! - **Progression Engine**: Converts habit-completion events into XP,
//!   levels, consecutive-day streaks (with freeze protection), and a
//!   weekly score, applied as one atomic unit per event
//! - **Storage**: SQLite-based completion log and stats, TOML configuration
//! - **Analytics**: Read-only pattern queries over the completion log
//!
//! ## Key Components
//!
//! - [`ProgressionCoordinator`]: Per-event state machine and stats updater
//! - [`HabitDb`]: Template, completion-log, and stats persistence
//! - [`GamificationConfig`]: Injected progression constants
//! - [`PatternAnalyzer`]: Completion-pattern analytics

pub mod analytics;
pub mod error;
pub mod habit;
pub mod progression;
pub mod storage;

pub use analytics::{HabitHistory, PatternAnalyzer, PatternReport, WeeklyTotal};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use habit::{
    DailyHabitRecord, FreezeStatus, HabitTemplate, RecordState, SkipReason, StatsSnapshot,
    UserStats,
};
pub use progression::{
    CompletionOutcome, GamificationConfig, ProgressionCoordinator, StreakWalk,
};
pub use storage::{Config, DataResetSummary, HabitDb};
