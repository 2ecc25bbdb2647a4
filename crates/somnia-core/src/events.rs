use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Phase, SleepRecord};

/// Every state change in the system produces an Event.
/// The CLI prints them; a presentation layer would subscribe to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A brand-new sleep session began and its deadline was registered.
    SessionStarted {
        session: u64,
        started_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The sleeper woke mid-session; the alarm was cancelled and a grace
    /// window opened.
    WakeDetected {
        wake_time: DateTime<Utc>,
        grace_until: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Sleep returned within the grace window; the logical session resumed
    /// with its original deadline.
    SessionResumed {
        original_start: DateTime<Utc>,
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The grace window expired without sleep returning.
    SessionAbandoned {
        original_start: Option<DateTime<Utc>>,
        awake_for_ms: i64,
        at: DateTime<Utc>,
    },
    /// Test-mode side channel: a short alarm was registered off an exercise
    /// event.
    TestAlarmScheduled {
        deadline: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// The registered deadline was reached. The record has been reset.
    AlarmFired {
        session: u64,
        started_at: Option<DateTime<Utc>>,
        scheduled_for: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    /// Full record snapshot, for status displays.
    Snapshot {
        phase: Phase,
        record: SleepRecord,
        alarm_in_ms: Option<i64>,
        at: DateTime<Utc>,
    },
}
