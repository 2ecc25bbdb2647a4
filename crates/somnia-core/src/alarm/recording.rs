//! Deterministic scheduler stand-in.
//!
//! Captures every schedule/cancel call instead of registering a real timer.
//! Used by unit tests and the CLI `simulate` command, and as an inert
//! scheduler for offline record edits (status, test-mode toggles) where no
//! live registration exists.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::AlarmScheduler;
use crate::error::SchedulingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCall {
    Schedule(DateTime<Utc>),
    Cancel,
}

#[derive(Debug, Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<SchedulerCall>>,
    scheduled: Mutex<Option<DateTime<Utc>>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently "registered" deadline, if any.
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        *self.scheduled.lock().unwrap()
    }

    /// Drain the captured calls.
    pub fn take_calls(&self) -> Vec<SchedulerCall> {
        std::mem::take(&mut self.calls.lock().unwrap())
    }

    /// Captured calls without draining.
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl AlarmScheduler for RecordingScheduler {
    fn schedule(&self, at: DateTime<Utc>) -> Result<(), SchedulingError> {
        let mut scheduled = self.scheduled.lock().unwrap();
        if *scheduled == Some(at) {
            // Idempotent re-registration of the identical time.
            return Ok(());
        }
        *scheduled = Some(at);
        self.calls.lock().unwrap().push(SchedulerCall::Schedule(at));
        Ok(())
    }

    fn cancel(&self) -> Result<(), SchedulingError> {
        let mut scheduled = self.scheduled.lock().unwrap();
        if scheduled.take().is_some() {
            self.calls.lock().unwrap().push(SchedulerCall::Cancel);
        }
        Ok(())
    }
}
