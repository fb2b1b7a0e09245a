use std::collections::HashMap;

use clap::Subcommand;
use habitloom_core::{DailyHabitRecord, SkipReason};
use serde::Serialize;

use crate::common;

#[derive(Subcommand)]
pub enum HabitAction {
    /// Complete a habit for a date, or toggle an existing completion off
    Complete {
        template_id: String,
        /// Date "YYYY-MM-DD" (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Skip a habit for a date with a reason
    Skip {
        template_id: String,
        /// One of: no_time, low_energy, sick, travel, forgot, not_today, other
        #[arg(long)]
        reason: SkipReason,
        #[arg(long)]
        date: Option<String>,
    },
    /// Show today's records
    Today,
    /// Show records for a specific date
    Day { date: String },
    /// Show history for one habit
    History {
        template_id: String,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

/// A record joined with its template's display name.
#[derive(Serialize)]
struct RecordView {
    #[serde(flatten)]
    record: DailyHabitRecord,
    template_name: Option<String>,
}

pub fn run(action: HabitAction, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut coordinator = common::open_coordinator()?;
    let now = chrono::Utc::now();

    match action {
        HabitAction::Complete { template_id, date } => {
            let date = date.unwrap_or_else(common::today);
            let outcome = coordinator.complete_habit(user, &template_id, &date, now)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        HabitAction::Skip {
            template_id,
            reason,
            date,
        } => {
            let date = date.unwrap_or_else(common::today);
            let outcome = coordinator.skip_habit(user, &template_id, &date, reason, now)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        HabitAction::Today => {
            print_day(&coordinator, user, &common::today())?;
        }
        HabitAction::Day { date } => {
            print_day(&coordinator, user, &date)?;
        }
        HabitAction::History { template_id, days } => {
            let today = habitloom_core::habit::parse_day(&common::today())?;
            let history = coordinator.habit_history(user, &template_id, days, today)?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}

fn print_day(
    coordinator: &habitloom_core::ProgressionCoordinator,
    user: &str,
    date: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let day = habitloom_core::habit::parse_day(date)?;
    let records = coordinator.db().list_records_for_date(user, day)?;
    let names: HashMap<String, String> = coordinator
        .db()
        .list_templates(user, None)?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    let views: Vec<RecordView> = records
        .into_iter()
        .map(|record| RecordView {
            template_name: names.get(&record.template_id).cloned(),
            record,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}
