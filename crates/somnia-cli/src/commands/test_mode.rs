use clap::Subcommand;

use super::offline_monitor;

#[derive(Subcommand)]
pub enum TestModeAction {
    /// Use the short debug sleep duration; an exercise event schedules the alarm
    On,
    /// Back to the real sleep duration
    Off,
}

pub fn run(action: TestModeAction) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = offline_monitor()?;
    let enabled = matches!(action, TestModeAction::On);
    monitor.set_test_mode(enabled)?;
    println!("test mode {}", if enabled { "on" } else { "off" });
    Ok(())
}
