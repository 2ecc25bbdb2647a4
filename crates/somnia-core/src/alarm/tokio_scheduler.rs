//! Tokio-backed one-shot alarm scheduler.
//!
//! Each `schedule` spawns a task that sleeps until the deadline and then
//! delivers the deadline over an unbounded channel. Replacing or cancelling
//! a registration aborts the pending task; a generation counter guards the
//! race between a task waking up and a concurrent cancel, so a cancelled
//! registration can never deliver.
//!
//! Must be created and used inside a tokio runtime.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::AlarmScheduler;
use crate::error::SchedulingError;

struct Pending {
    at: DateTime<Utc>,
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    tx: mpsc::UnboundedSender<DateTime<Utc>>,
    pending: Mutex<Option<Pending>>,
    next_generation: Mutex<u64>,
}

impl Inner {
    fn fire(&self, generation: u64, at: DateTime<Utc>) {
        let mut pending = self.pending.lock().unwrap();
        // A replace or cancel beat us to it; this registration is dead.
        match pending.as_ref() {
            Some(p) if p.generation == generation => {}
            _ => return,
        }
        *pending = None;
        drop(pending);
        if self.tx.send(at).is_err() {
            log::warn!("deadline reached at {at} but the consumer is gone");
        }
    }
}

pub struct TokioAlarmScheduler {
    inner: Arc<Inner>,
}

impl TokioAlarmScheduler {
    /// Create a scheduler and the receiver its "deadline reached"
    /// notifications arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DateTime<Utc>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            inner: Arc::new(Inner {
                tx,
                pending: Mutex::new(None),
                next_generation: Mutex::new(0),
            }),
        };
        (scheduler, rx)
    }

    /// The currently registered deadline, if any.
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.inner.pending.lock().unwrap().as_ref().map(|p| p.at)
    }
}

impl AlarmScheduler for TokioAlarmScheduler {
    fn schedule(&self, at: DateTime<Utc>) -> Result<(), SchedulingError> {
        let mut pending = self.inner.pending.lock().unwrap();
        if let Some(p) = pending.as_ref() {
            if p.at == at {
                return Ok(());
            }
        }
        if let Some(old) = pending.take() {
            old.handle.abort();
        }

        let generation = {
            let mut next = self.inner.next_generation.lock().unwrap();
            *next += 1;
            *next
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let delay = (at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(delay).await;
            inner.fire(generation, at);
        });

        *pending = Some(Pending {
            at,
            generation,
            handle,
        });
        log::debug!("alarm registered for {at}");
        Ok(())
    }

    fn cancel(&self) -> Result<(), SchedulingError> {
        if let Some(old) = self.inner.pending.lock().unwrap().take() {
            old.handle.abort();
            log::debug!("alarm for {} cancelled", old.at);
        }
        Ok(())
    }
}
