use clap::Subcommand;

use crate::common;

#[derive(Subcommand)]
pub enum AnalyticsAction {
    /// Pattern intelligence over a trailing window
    Patterns {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Completions grouped by ISO week
    Weekly {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
}

pub fn run(action: AnalyticsAction, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = common::open_coordinator()?;
    let today = habitloom_core::habit::parse_day(&common::today())?;

    match action {
        AnalyticsAction::Patterns { days } => {
            let report = coordinator.pattern_report(user, days, today)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AnalyticsAction::Weekly { days } => {
            let totals = coordinator.weekly_totals(user, days, today)?;
            println!("{}", serde_json::to_string_pretty(&totals)?);
        }
    }
    Ok(())
}
