//! Single-writer wiring of state machine, storage, and alarm scheduler.
//!
//! Activity events and the deadline callback originate from independent
//! execution contexts, so every record mutation goes through one mutex:
//! read the full record, compute the next record plus intent, persist,
//! apply the intent. The record is written *before* the deadline is
//! registered, which keeps the crash window to "deadline registered with no
//! matching record" -- harmless, because the alarm-fired handler is
//! idempotent.
//!
//! Scheduling failures are surfaced, never retried here; the recorded
//! `scheduled_alarm_time` is kept optimistically (the only recovery signal
//! in scope is the alarm-fired notification never arriving).

use std::sync::Mutex;

use chrono::Utc;

use crate::alarm::AlarmScheduler;
use crate::error::Result;
use crate::events::Event;
use crate::session::{ActivityEvent, MachineParams, SleepRecord, SleepStateMachine};
use crate::storage::{Database, SessionOutcome};

struct Inner {
    record: SleepRecord,
    db: Database,
}

pub struct Monitor<S: AlarmScheduler> {
    machine: SleepStateMachine,
    scheduler: S,
    inner: Mutex<Inner>,
}

impl<S: AlarmScheduler> Monitor<S> {
    /// Load the persisted record (repairing it if the start/wake mutual
    /// exclusion was violated) and wire everything together.
    pub fn new(db: Database, scheduler: S, params: MachineParams) -> Result<Self> {
        let mut record = db.load_record()?.unwrap_or_default();
        if record.repair() {
            db.save_record(&record)?;
        }
        Ok(Self {
            machine: SleepStateMachine::new(params),
            scheduler,
            inner: Mutex::new(Inner { record, db }),
        })
    }

    /// Feed one classified activity event through the state machine.
    ///
    /// Returns the observer event, if the transition produced one.
    pub fn on_activity(&self, event: ActivityEvent) -> Result<Option<Event>> {
        let mut inner = self.lock();
        let now = Utc::now();
        let step = {
            let Inner { record, .. } = &mut *inner;
            self.machine.handle_activity(record, event, now)
        };

        if let Some(Event::SessionAbandoned {
            original_start,
            at,
            ..
        }) = &step.event
        {
            inner.db.record_session(
                inner.record.session_count,
                SessionOutcome::Abandoned,
                *original_start,
                *at,
            )?;
        }

        inner.db.save_record(&inner.record)?;
        if let Some(intent) = step.intent {
            self.scheduler.apply(intent)?;
        }
        Ok(step.event)
    }

    /// The registered deadline was reached. Resets the record; idempotent
    /// when no registration was recorded (stale firing after a crash).
    pub fn on_alarm_fired(&self) -> Result<Event> {
        let mut inner = self.lock();
        let now = Utc::now();
        let had_registration = inner.record.scheduled_alarm_time.is_some();
        if !had_registration {
            log::warn!("alarm fired with no registration recorded");
        }
        let event = {
            let Inner { record, .. } = &mut *inner;
            self.machine.handle_alarm_fired(record, now)
        };
        if had_registration {
            if let Event::AlarmFired {
                session,
                started_at,
                at,
                ..
            } = &event
            {
                inner
                    .db
                    .record_session(*session, SessionOutcome::Completed, *started_at, *at)?;
            }
        }
        inner.db.save_record(&inner.record)?;
        Ok(event)
    }

    /// Mark monitoring active. The caller owns the activity source; if it
    /// cannot deliver, it reports `MonitorError::PermissionDenied` and this
    /// is never called.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.record.monitoring_active = true;
        inner.db.save_record(&inner.record)?;
        log::info!("monitoring started");
        Ok(())
    }

    /// Stop monitoring: clear session-scoped fields and cancel any live
    /// registration. `session_count` survives.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.record.clear_session_fields();
        inner.record.monitoring_active = false;
        inner.record.last_activity = None;
        inner.db.save_record(&inner.record)?;
        self.scheduler.cancel()?;
        log::info!("monitoring stopped, session fields cleared");
        Ok(())
    }

    /// Toggle test mode. Any pending alarm is cancelled and session-scoped
    /// fields are reset in both directions, so a short debug alarm can never
    /// coexist with real session bookkeeping.
    pub fn set_test_mode(&self, enabled: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.record.test_mode = enabled;
        inner.record.clear_session_fields();
        inner.db.save_record(&inner.record)?;
        self.scheduler.cancel()?;
        log::info!("test mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Current record snapshot with the alarm countdown, for displays.
    pub fn snapshot(&self) -> Event {
        let inner = self.lock();
        let now = Utc::now();
        Event::Snapshot {
            phase: inner.record.phase(),
            alarm_in_ms: inner
                .record
                .alarm_countdown(now)
                .map(|d| d.num_milliseconds()),
            record: inner.record.clone(),
            at: now,
        }
    }

    pub fn record(&self) -> SleepRecord {
        self.lock().record.clone()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn params(&self) -> MachineParams {
        *self.machine.params()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Single-writer discipline; a poisoned lock means a panic mid-update
        // and there is no safe way to continue.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
