use chrono::Utc;
use clap::Args;
use somnia_core::{Database, Event};

use super::print_json;

#[derive(Args)]
pub struct StatusArgs {
    /// Also print the most recent N history rows
    #[arg(long, value_name = "N")]
    pub history: Option<u32>,
}

pub fn run(args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let mut record = db.load_record()?.unwrap_or_default();
    if record.repair() {
        db.save_record(&record)?;
    }

    let now = Utc::now();
    let snapshot = Event::Snapshot {
        phase: record.phase(),
        alarm_in_ms: record.alarm_countdown(now).map(|d| d.num_milliseconds()),
        record,
        at: now,
    };
    print_json(&snapshot)?;

    if let Some(limit) = args.history {
        print_json(&db.recent_sessions(limit)?)?;
    }
    Ok(())
}
