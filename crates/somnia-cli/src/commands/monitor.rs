use clap::Subcommand;

use super::offline_monitor;

#[derive(Subcommand)]
pub enum MonitorAction {
    /// Mark monitoring active
    Start,
    /// Stop monitoring and clear session state
    Stop,
}

pub fn run(action: MonitorAction) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = offline_monitor()?;
    match action {
        MonitorAction::Start => {
            monitor.start()?;
            println!("monitoring started");
        }
        MonitorAction::Stop => {
            monitor.stop()?;
            println!("monitoring stopped");
        }
    }
    Ok(())
}
