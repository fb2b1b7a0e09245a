use clap::Subcommand;

use crate::common;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Current progression stats
    Show,
    /// Create the stats row if it does not exist yet
    Init,
    /// Delete the completion log and zero the stats
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: StatsAction, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut coordinator = common::open_coordinator()?;
    let now = chrono::Utc::now();

    match action {
        StatsAction::Show => match coordinator.user_stats(user)? {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("no stats yet for user '{user}'"),
        },
        StatsAction::Init => {
            let stats = coordinator.initialize_user_stats(user, now)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Reset { yes } => {
            if !yes {
                return Err("refusing to reset without --yes".into());
            }
            let summary = coordinator.reset_all_data(user, now)?;
            println!(
                "deleted {} records, stats reset: {}",
                summary.deleted_records, summary.stats_reset
            );
        }
    }
    Ok(())
}
