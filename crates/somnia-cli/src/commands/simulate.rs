//! Dry-run replay of a scripted event sequence.
//!
//! Drives the state machine directly with event-time clocks (delivery time
//! equals the event timestamp), so the printed deadlines are exact. Nothing
//! is persisted and no real timer is registered; scheduling calls are
//! captured and printed at the end.
//!
//! ```text
//! somnia-cli simulate --events "asleep@0,exercise@7h50m,asleep@7h55m"
//! ```

use chrono::{Duration, Utc};
use clap::Args;
use serde_json::json;
use somnia_core::{
    Activity, ActivityEvent, AlarmScheduler, Config, RecordingScheduler, SchedulerCall,
    SleepRecord, SleepStateMachine,
};

use super::print_json;

#[derive(Args)]
pub struct SimulateArgs {
    /// Comma-separated `kind@offset` pairs; offsets like `30s`, `90m`, `7h50m`
    #[arg(long)]
    pub events: String,
    /// Run with the test-mode flag set
    #[arg(long)]
    pub test_mode: bool,
    /// Fire the pending alarm at the end of the sequence
    #[arg(long)]
    pub fire: bool,
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    let machine = SleepStateMachine::new(config.machine_params());
    let scheduler = RecordingScheduler::new();
    let mut record = SleepRecord {
        test_mode: args.test_mode,
        ..Default::default()
    };

    let base = Utc::now();
    let mut last_offset = Duration::zero();
    for spec in args.events.split(',') {
        let (kind, offset) = parse_spec(spec.trim())?;
        let at = base + offset;
        last_offset = offset;
        let step = machine.handle_activity(&mut record, ActivityEvent::new(at, kind), at);
        if let Some(event) = step.event {
            print_json(&event)?;
        }
        if let Some(intent) = step.intent {
            scheduler.apply(intent)?;
        }
    }

    if args.fire {
        let event = machine.handle_alarm_fired(&mut record, base + last_offset);
        scheduler.cancel()?;
        print_json(&event)?;
    }

    print_json(&json!({
        "final_phase": record.phase(),
        "record": record,
        "scheduler_calls": scheduler
            .take_calls()
            .iter()
            .map(|call| match call {
                SchedulerCall::Schedule(at) => json!({"schedule": at}),
                SchedulerCall::Cancel => json!("cancel"),
            })
            .collect::<Vec<_>>(),
    }))
}

fn parse_spec(spec: &str) -> Result<(Activity, Duration), String> {
    let (kind, offset) = spec
        .split_once('@')
        .ok_or_else(|| format!("expected kind@offset, got: {spec}"))?;
    Ok((kind.parse::<Activity>()?, parse_offset(offset)?))
}

/// `0`, `45s`, `10m`, `8h`, or combinations like `7h50m`.
fn parse_offset(s: &str) -> Result<Duration, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(Duration::seconds(secs));
    }
    let mut total = Duration::zero();
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| format!("bad offset: {s}"))?;
        digits.clear();
        total = total
            + match c {
                'h' => Duration::hours(value),
                'm' => Duration::minutes(value),
                's' => Duration::seconds(value),
                other => return Err(format!("bad offset unit '{other}' in {s}")),
            };
    }
    if !digits.is_empty() {
        return Err(format!("trailing digits without a unit in {s}"));
    }
    Ok(total)
}
