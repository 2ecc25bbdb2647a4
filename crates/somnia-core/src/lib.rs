//! # Somnia Core Library
//!
//! This library provides the core business logic for Somnia, a wearable-style
//! sleep alarm: it watches a stream of coarse activity classifications and
//! fires a one-shot wake-up alarm a fixed sleep duration after continuous
//! sleep began, tolerating brief interruptions (a bathroom break, some
//! tossing around) without resetting the whole timer.
//!
//! It implements a CLI-first philosophy where all operations are available
//! via a standalone CLI binary; any GUI or watch-face layer is expected to be
//! a thin shell over the same core library.
//!
//! ## Architecture
//!
//! - **Sleep State Machine**: a strictly sequential reducer over timestamped
//!   activity events. It owns the persisted [`SleepRecord`] and emits at most
//!   one scheduling intent per event.
//! - **Alarm Scheduler**: the [`AlarmScheduler`] trait is the boundary to the
//!   host's one-shot timer facility. [`TokioAlarmScheduler`] is the real
//!   implementation; [`RecordingScheduler`] is a deterministic stand-in for
//!   tests and dry runs.
//! - **Monitor**: the single-writer serialization point that wires the state
//!   machine, storage, and scheduler together.
//! - **Storage**: SQLite-based record persistence and TOML-based
//!   configuration.
//!
//! ## Key Components
//!
//! - [`SleepStateMachine`]: the grace-period transition table
//! - [`Monitor`]: event intake and alarm-fired handling
//! - [`Database`]: persisted record and session history
//! - [`Config`]: sleep duration / grace window configuration

pub mod alarm;
pub mod error;
pub mod events;
pub mod monitor;
pub mod session;
pub mod storage;

pub use alarm::{
    AlarmScheduler, RecordingScheduler, SchedulerCall, SchedulingIntent, TokioAlarmScheduler,
};
pub use error::{ConfigError, CoreError, MonitorError, SchedulingError, StorageError};
pub use events::Event;
pub use monitor::Monitor;
pub use session::{
    Activity, ActivityEvent, MachineParams, Phase, SleepRecord, SleepStateMachine, Step,
};
pub use storage::{Config, Database, SessionOutcome, SessionRow};
