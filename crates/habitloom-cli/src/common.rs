use habitloom_core::{Config, HabitDb, ProgressionCoordinator};

/// Open the coordinator over the default database with configured
/// gamification constants.
pub fn open_coordinator() -> Result<ProgressionCoordinator, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = HabitDb::open()?;
    Ok(ProgressionCoordinator::with_config(db, config.gamification))
}

/// Resolve the acting user: the `--user` flag if given, otherwise the
/// configured default.
pub fn resolve_user(flag: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    match flag {
        Some(user) => Ok(user),
        None => Ok(Config::load()?.default_user),
    }
}

/// Today's date in the local calendar as "YYYY-MM-DD".
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
