//! The persisted sleep session record.
//!
//! A single small document, not a collection -- only one session is ever
//! active. The record is mutated exclusively by the state machine and the
//! monitor's lifecycle operations; everything else reads snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Coarse activity classification delivered by the external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Asleep,
    Passive,
    Exercise,
    Unknown,
}

impl std::str::FromStr for Activity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asleep" => Ok(Activity::Asleep),
            "passive" => Ok(Activity::Passive),
            "exercise" => Ok(Activity::Exercise),
            "unknown" => Ok(Activity::Unknown),
            other => Err(format!("unknown activity classification: {other}")),
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Activity::Asleep => "asleep",
            Activity::Passive => "passive",
            Activity::Exercise => "exercise",
            Activity::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Derived session phase. Never stored; always computed from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No session.
    Idle,
    /// Session active, alarm scheduled.
    Sleeping,
    /// Woke recently; the session may still resume.
    GraceWindow,
}

/// Single persisted sleep session record.
///
/// Invariants:
/// - at most one of `start_time` / `wake_time` is set (either currently
///   asleep, or awake with a pending grace window, or neither);
/// - `scheduled_alarm_time` is set iff the alarm scheduler holds a live
///   registration;
/// - `original_start_time`, once set, is only cleared when the session is
///   abandoned, its alarm fires, monitoring stops, or test mode is toggled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    /// Beginning of the *current* continuous sleep interval.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Beginning of the *logical* session, preserved across grace-period
    /// interruptions.
    #[serde(default)]
    pub original_start_time: Option<DateTime<Utc>>,
    /// Most recent transition out of sleep.
    #[serde(default)]
    pub wake_time: Option<DateTime<Utc>>,
    /// Currently registered alarm deadline.
    #[serde(default)]
    pub scheduled_alarm_time: Option<DateTime<Utc>>,
    /// Count of started sessions, for diagnostics. Never reset.
    #[serde(default)]
    pub session_count: u64,
    /// Most recent classification, for display only.
    #[serde(default)]
    pub last_activity: Option<Activity>,
    /// Substitute the short debug sleep duration for the real one.
    #[serde(default)]
    pub test_mode: bool,
    /// Whether the user has monitoring switched on.
    #[serde(default)]
    pub monitoring_active: bool,
}

impl SleepRecord {
    pub fn phase(&self) -> Phase {
        if self.start_time.is_some() {
            Phase::Sleeping
        } else if self.wake_time.is_some() {
            Phase::GraceWindow
        } else {
            Phase::Idle
        }
    }

    /// Enforce the `start_time` / `wake_time` mutual exclusion on read.
    ///
    /// Both set should never occur; the safe recovery is to treat the record
    /// as idle and drop both. Returns true if a repair was made.
    pub fn repair(&mut self) -> bool {
        if self.start_time.is_some() && self.wake_time.is_some() {
            log::warn!(
                "record has both start_time ({:?}) and wake_time ({:?}); recovering as idle",
                self.start_time,
                self.wake_time
            );
            self.start_time = None;
            self.wake_time = None;
            true
        } else {
            false
        }
    }

    /// Clear every session-scoped field. `session_count`, `last_activity`,
    /// `test_mode`, and `monitoring_active` survive.
    pub fn clear_session_fields(&mut self) {
        self.start_time = None;
        self.original_start_time = None;
        self.wake_time = None;
        self.scheduled_alarm_time = None;
    }

    /// Time until the registered deadline, if one exists and is in the future.
    pub fn alarm_countdown(&self, now: DateTime<Utc>) -> Option<Duration> {
        let at = self.scheduled_alarm_time?;
        let remaining = at - now;
        (remaining > Duration::zero()).then_some(remaining)
    }
}
