use clap::Subcommand;

use crate::common;

#[derive(Subcommand)]
pub enum FreezeAction {
    /// Streak-protection status
    Status,
    /// Activate a streak freeze (24 hours of protection)
    Use,
}

pub fn run(action: FreezeAction, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut coordinator = common::open_coordinator()?;
    let now = chrono::Utc::now();

    match action {
        FreezeAction::Status => {
            let status = coordinator.freeze_status(user, now)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        FreezeAction::Use => {
            let status = coordinator.use_streak_freeze(user, now)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
