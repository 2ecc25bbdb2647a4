pub mod config;
pub mod monitor;
pub mod run;
pub mod simulate;
pub mod status;
pub mod test_mode;

use somnia_core::{Config, Database, Monitor, RecordingScheduler};

/// Open the persisted record behind an inert scheduler, for offline record
/// edits (no live registration exists outside a `run` process; cancels are
/// reflected in the record only).
pub fn offline_monitor() -> Result<Monitor<RecordingScheduler>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    let db = Database::open()?;
    Ok(Monitor::new(
        db,
        RecordingScheduler::new(),
        config.machine_params(),
    )?)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
