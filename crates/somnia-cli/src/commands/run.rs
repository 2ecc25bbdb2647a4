//! Long-lived monitor loop.
//!
//! Reads classification events (one per line, `asleep` / `passive` /
//! `exercise` / `unknown`, optionally `kind@rfc3339-timestamp`) from stdin
//! or a file, feeds them through the state machine, and keeps a real tokio
//! deadline registered. When the deadline is reached the alarm event is
//! printed -- the presentation layer (full-screen alert, vibration) hangs
//! off that line.

use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use somnia_core::{
    Activity, ActivityEvent, AlarmScheduler, Config, CoreError, Database, Monitor, MonitorError,
    TokioAlarmScheduler,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::print_json;

#[derive(Args)]
pub struct RunArgs {
    /// Read events from a file instead of stdin
    #[arg(long)]
    pub from: Option<PathBuf>,
    /// Exit once the event source is exhausted even if an alarm is pending
    #[arg(long)]
    pub no_wait: bool,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_loop(args))
}

async fn run_loop(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    let db = Database::open()?;
    let (scheduler, mut alarm_rx) = TokioAlarmScheduler::new();
    let monitor = Monitor::new(db, scheduler, config.machine_params())?;

    let mut lines = open_source(args.from.as_deref()).await?.lines();
    monitor.start()?;

    // A deadline persisted by a previous run has no live registration in
    // this process; re-register it so record and scheduler agree.
    if let Some(at) = monitor.record().scheduled_alarm_time {
        log::info!("re-registering persisted deadline at {at}");
        monitor.scheduler().schedule(at)?;
    }

    let mut source_open = true;
    loop {
        tokio::select! {
            fired = alarm_rx.recv() => {
                if fired.is_none() {
                    break;
                }
                let event = monitor.on_alarm_fired()?;
                print_json(&event)?;
                if !source_open {
                    break;
                }
            }
            line = lines.next_line(), if source_open => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        match parse_event(line) {
                            Ok(event) => {
                                if let Some(out) = monitor.on_activity(event)? {
                                    print_json(&out)?;
                                }
                            }
                            Err(e) => log::warn!("ignoring event line: {e}"),
                        }
                    }
                    None => {
                        source_open = false;
                        if args.no_wait || monitor.record().scheduled_alarm_time.is_none() {
                            break;
                        }
                        log::info!("event source exhausted, waiting for the alarm");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn open_source(
    path: Option<&std::path::Path>,
) -> Result<Box<dyn AsyncBufRead + Unpin>, CoreError> {
    match path {
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        Some(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    CoreError::Monitor(MonitorError::PermissionDenied(
                        path.display().to_string(),
                    ))
                } else {
                    CoreError::Io(e)
                }
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// `asleep` or `asleep@2026-03-01T23:10:00Z`. A bare kind is stamped now.
fn parse_event(line: &str) -> Result<ActivityEvent, String> {
    match line.split_once('@') {
        None => Ok(ActivityEvent::new(Utc::now(), line.parse::<Activity>()?)),
        Some((kind, ts)) => {
            let kind = kind.parse::<Activity>()?;
            let at = chrono::DateTime::parse_from_rfc3339(ts)
                .map_err(|e| format!("bad timestamp {ts}: {e}"))?
                .with_timezone(&Utc);
            Ok(ActivityEvent::new(at, kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_kind() {
        let event = parse_event("asleep").unwrap();
        assert_eq!(event.kind, Activity::Asleep);
    }

    #[test]
    fn parses_kind_with_timestamp() {
        let event = parse_event("exercise@2026-03-01T23:10:00Z").unwrap();
        assert_eq!(event.kind, Activity::Exercise);
        assert_eq!(event.at.to_rfc3339(), "2026-03-01T23:10:00+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_event("napping").is_err());
        assert!(parse_event("asleep@yesterday").is_err());
    }
}
