//! Alarm scheduler boundary.
//!
//! The state machine never talks to a timer facility directly; it emits a
//! [`SchedulingIntent`] and the monitor applies it through the
//! [`AlarmScheduler`] trait. Any concrete mechanism satisfying
//! "exactly-once deadline notification, cancellable" fulfills the contract.

mod recording;
mod tokio_scheduler;

pub use recording::{RecordingScheduler, SchedulerCall};
pub use tokio_scheduler::TokioAlarmScheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

/// What the state machine wants done with the single outstanding deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum SchedulingIntent {
    /// Replace any live registration with a one-shot deadline at `at`.
    Schedule { at: DateTime<Utc> },
    /// Remove any live registration.
    Cancel,
}

/// One-shot deadline registration with the host's timer facility.
///
/// Implementations must use exact-time semantics (not best-effort/batched)
/// and deliver exactly one "deadline reached" notification per successful
/// `schedule` -- never more, never for a cancelled registration.
pub trait AlarmScheduler: Send + Sync {
    /// Replace any existing registration with a new one-shot deadline.
    ///
    /// Calling with an already-registered identical time is a no-op.
    fn schedule(&self, at: DateTime<Utc>) -> Result<(), SchedulingError>;

    /// Remove any existing registration; no-op if none exists.
    fn cancel(&self) -> Result<(), SchedulingError>;

    /// Apply a state machine intent.
    fn apply(&self, intent: SchedulingIntent) -> Result<(), SchedulingError> {
        match intent {
            SchedulingIntent::Schedule { at } => self.schedule(at),
            SchedulingIntent::Cancel => self.cancel(),
        }
    }
}

impl<S: AlarmScheduler + ?Sized> AlarmScheduler for std::sync::Arc<S> {
    fn schedule(&self, at: DateTime<Utc>) -> Result<(), SchedulingError> {
        (**self).schedule(at)
    }

    fn cancel(&self) -> Result<(), SchedulingError> {
        (**self).cancel()
    }
}
