//! Sleep session state machine.
//!
//! A wall-clock-based reducer with no internal threads: the caller feeds it
//! one timestamped activity event at a time, it mutates the persisted
//! [`SleepRecord`] and returns at most one scheduling intent. The caller is
//! responsible for persisting the record and applying the intent, in that
//! order.
//!
//! ## Phase Transitions
//!
//! ```text
//! Idle -> Sleeping -> GraceWindow -> (Sleeping | Idle)
//! ```
//!
//! A wake interruption shorter than the grace window resumes the *logical*
//! session: the deadline stays anchored to `original_start_time`, not to the
//! moment sleep returned.

use chrono::{DateTime, Duration, Utc};

use super::record::{Activity, Phase, SleepRecord};
use crate::alarm::SchedulingIntent;
use crate::events::Event;

/// Durations the transition table runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineParams {
    /// Deadline offset from the logical session start (normal mode).
    pub sleep_duration: Duration,
    /// How long a wake interruption may last and still count as the same
    /// session. Mode-independent.
    pub grace_window: Duration,
    /// Short deadline offset used by the test-mode override.
    pub test_sleep_duration: Duration,
    /// Minimal delay used when a resumed session is already past its
    /// deadline. The alarm is never fired synchronously.
    pub resume_overdue_delay: Duration,
}

impl Default for MachineParams {
    fn default() -> Self {
        Self {
            sleep_duration: Duration::hours(8),
            grace_window: Duration::hours(1),
            test_sleep_duration: Duration::minutes(1),
            resume_overdue_delay: Duration::seconds(1),
        }
    }
}

/// One timestamped classification from the external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityEvent {
    pub at: DateTime<Utc>,
    pub kind: Activity,
}

impl ActivityEvent {
    pub fn new(at: DateTime<Utc>, kind: Activity) -> Self {
        Self { at, kind }
    }
}

/// Result of processing one event: an observer event and a scheduling
/// intent, either of which may be absent.
#[derive(Debug, Clone)]
pub struct Step {
    pub event: Option<Event>,
    pub intent: Option<SchedulingIntent>,
}

impl Step {
    fn none() -> Self {
        Self {
            event: None,
            intent: None,
        }
    }

    fn emit(event: Event, intent: SchedulingIntent) -> Self {
        Self {
            event: Some(event),
            intent: Some(intent),
        }
    }
}

/// The grace-period transition table.
///
/// Stateless apart from its parameters; all session state lives in the
/// [`SleepRecord`] so that it survives restarts.
#[derive(Debug, Clone)]
pub struct SleepStateMachine {
    params: MachineParams,
}

impl SleepStateMachine {
    pub fn new(params: MachineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MachineParams {
        &self.params
    }

    /// Process one activity event.
    ///
    /// `now` is passed separately from the event timestamp because the
    /// classifier can deliver with a lag; deadlines for resumed and
    /// test-mode sessions anchor to `now`, session bookkeeping anchors to
    /// the event timestamp.
    pub fn handle_activity(
        &self,
        record: &mut SleepRecord,
        event: ActivityEvent,
        now: DateTime<Utc>,
    ) -> Step {
        record.last_activity = Some(event.kind);

        // Test-mode side channel: exists purely to make alarm delivery
        // verifiable without waiting hours. Bypasses the grace-period logic
        // and leaves start/original bookkeeping alone.
        if record.test_mode && event.kind == Activity::Exercise {
            return self.test_mode_override(record, now);
        }

        match event.kind {
            Activity::Asleep => self.on_asleep(record, event.at, now),
            Activity::Passive | Activity::Exercise => self.on_wake(record, event.at),
            Activity::Unknown => {
                log::debug!("unknown classification at {}, label-only update", event.at);
                Step::none()
            }
        }
    }

    /// The registered deadline was consumed. Reset the record to its empty
    /// state so no stale alarm reference survives; `session_count` is kept.
    pub fn handle_alarm_fired(&self, record: &mut SleepRecord, now: DateTime<Utc>) -> Event {
        let event = Event::AlarmFired {
            session: record.session_count,
            started_at: record.original_start_time,
            scheduled_for: record.scheduled_alarm_time,
            at: now,
        };
        record.clear_session_fields();
        log::info!("alarm fired, session record reset");
        event
    }

    fn test_mode_override(&self, record: &mut SleepRecord, now: DateTime<Utc>) -> Step {
        if let Some(at) = record.scheduled_alarm_time {
            log::debug!("test mode: alarm already scheduled for {at}");
            return Step::none();
        }
        let deadline = now + self.params.test_sleep_duration;
        record.scheduled_alarm_time = Some(deadline);
        log::info!("test mode: scheduling alarm for {deadline}");
        Step::emit(
            Event::TestAlarmScheduled { deadline, at: now },
            SchedulingIntent::Schedule { at: deadline },
        )
    }

    fn on_asleep(
        &self,
        record: &mut SleepRecord,
        event_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Step {
        match record.phase() {
            Phase::Sleeping => {
                log::debug!(
                    "already sleeping, alarm scheduled for {:?}",
                    record.scheduled_alarm_time
                );
                Step::none()
            }
            Phase::GraceWindow => {
                let wake_time = record.wake_time.unwrap_or(event_time);
                let awake_for = event_time - wake_time;
                match record.original_start_time {
                    Some(original) if awake_for < self.params.grace_window => {
                        self.resume_session(record, original, event_time, now)
                    }
                    _ => self.start_session(record, event_time),
                }
            }
            Phase::Idle => self.start_session(record, event_time),
        }
    }

    fn start_session(&self, record: &mut SleepRecord, event_time: DateTime<Utc>) -> Step {
        let deadline = event_time + self.params.sleep_duration;
        record.session_count += 1;
        record.start_time = Some(event_time);
        record.original_start_time = Some(event_time);
        record.wake_time = None;
        record.scheduled_alarm_time = Some(deadline);
        log::info!(
            "new sleep session #{}, alarm at {deadline}",
            record.session_count
        );
        Step::emit(
            Event::SessionStarted {
                session: record.session_count,
                started_at: event_time,
                deadline,
                at: event_time,
            },
            SchedulingIntent::Schedule { at: deadline },
        )
    }

    fn resume_session(
        &self,
        record: &mut SleepRecord,
        original: DateTime<Utc>,
        event_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Step {
        let remaining = self.params.sleep_duration - (event_time - original);
        let deadline = if remaining > Duration::zero() {
            now + remaining
        } else {
            // The full duration already elapsed while awake; schedule a
            // minimal-delay deadline rather than firing synchronously.
            now + self.params.resume_overdue_delay
        };
        record.start_time = Some(original);
        record.wake_time = None;
        record.scheduled_alarm_time = Some(deadline);
        log::info!("within grace window, session resumed, alarm at {deadline}");
        Step::emit(
            Event::SessionResumed {
                original_start: original,
                deadline,
                at: event_time,
            },
            SchedulingIntent::Schedule { at: deadline },
        )
    }

    fn on_wake(&self, record: &mut SleepRecord, event_time: DateTime<Utc>) -> Step {
        match record.phase() {
            Phase::Sleeping => {
                // Original start is preserved for grace-window restoration.
                record.start_time = None;
                record.wake_time = Some(event_time);
                record.scheduled_alarm_time = None;
                let grace_until = event_time + self.params.grace_window;
                log::info!("wake detected, alarm cancelled, grace window until {grace_until}");
                Step::emit(
                    Event::WakeDetected {
                        wake_time: event_time,
                        grace_until,
                        at: event_time,
                    },
                    SchedulingIntent::Cancel,
                )
            }
            Phase::GraceWindow => {
                let wake_time = record.wake_time.unwrap_or(event_time);
                let awake_for = event_time - wake_time;
                if awake_for >= self.params.grace_window {
                    // The interruption became a real wake-up. Nothing is
                    // pending, so no intent is emitted.
                    let original = record.original_start_time.take();
                    record.wake_time = None;
                    log::info!("awake past the grace window, session abandoned");
                    Step {
                        event: Some(Event::SessionAbandoned {
                            original_start: original,
                            awake_for_ms: awake_for.num_milliseconds(),
                            at: event_time,
                        }),
                        intent: None,
                    }
                } else {
                    Step::none()
                }
            }
            Phase::Idle => Step::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_756_000_000, 0).unwrap()
    }

    fn machine() -> SleepStateMachine {
        SleepStateMachine::new(MachineParams::default())
    }

    /// Feed an event whose delivery time equals its timestamp.
    fn feed(
        machine: &SleepStateMachine,
        record: &mut SleepRecord,
        offset: Duration,
        kind: Activity,
    ) -> Step {
        let at = base() + offset;
        machine.handle_activity(record, ActivityEvent::new(at, kind), at)
    }

    #[test]
    fn first_asleep_starts_session_and_schedules() {
        let machine = machine();
        let mut record = SleepRecord::default();

        let step = feed(&machine, &mut record, Duration::zero(), Activity::Asleep);

        assert_eq!(record.phase(), Phase::Sleeping);
        assert_eq!(record.session_count, 1);
        assert_eq!(record.start_time, Some(base()));
        assert_eq!(record.original_start_time, Some(base()));
        let deadline = base() + Duration::hours(8);
        assert_eq!(record.scheduled_alarm_time, Some(deadline));
        assert_eq!(
            step.intent,
            Some(SchedulingIntent::Schedule { at: deadline })
        );
    }

    #[test]
    fn repeated_asleep_events_are_noops() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        let deadline = record.scheduled_alarm_time;

        for minutes in [10, 60, 240] {
            let step = feed(
                &machine,
                &mut record,
                Duration::minutes(minutes),
                Activity::Asleep,
            );
            assert!(step.intent.is_none());
            assert!(step.event.is_none());
        }
        assert_eq!(record.session_count, 1);
        assert_eq!(record.scheduled_alarm_time, deadline);
    }

    #[test]
    fn wake_cancels_alarm_and_opens_grace_window() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);

        let wake_offset = Duration::hours(8) - Duration::minutes(10);
        let step = feed(&machine, &mut record, wake_offset, Activity::Exercise);

        assert_eq!(record.phase(), Phase::GraceWindow);
        assert_eq!(record.wake_time, Some(base() + wake_offset));
        assert_eq!(record.start_time, None);
        assert_eq!(record.scheduled_alarm_time, None);
        assert_eq!(record.original_start_time, Some(base()));
        assert_eq!(step.intent, Some(SchedulingIntent::Cancel));
    }

    #[test]
    fn asleep_within_grace_window_resumes_original_deadline() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        feed(
            &machine,
            &mut record,
            Duration::hours(8) - Duration::minutes(10),
            Activity::Exercise,
        );

        let step = feed(
            &machine,
            &mut record,
            Duration::hours(8) - Duration::minutes(5),
            Activity::Asleep,
        );

        assert_eq!(record.phase(), Phase::Sleeping);
        assert_eq!(record.start_time, Some(base()));
        assert_eq!(record.session_count, 1, "no new session");
        // remaining = 8h - 7h55m = 5m, anchored at now = event time, so the
        // effective deadline is the original one.
        let deadline = base() + Duration::hours(8);
        assert_eq!(record.scheduled_alarm_time, Some(deadline));
        assert_eq!(
            step.intent,
            Some(SchedulingIntent::Schedule { at: deadline })
        );
    }

    #[test]
    fn asleep_after_grace_window_starts_new_session() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        feed(&machine, &mut record, Duration::hours(4), Activity::Passive);

        let second_start = Duration::hours(4) + Duration::minutes(61);
        let step = feed(&machine, &mut record, second_start, Activity::Asleep);

        assert_eq!(record.session_count, 2);
        let deadline = base() + second_start + Duration::hours(8);
        assert_eq!(record.scheduled_alarm_time, Some(deadline));
        assert_eq!(record.original_start_time, Some(base() + second_start));
        assert_eq!(
            step.intent,
            Some(SchedulingIntent::Schedule { at: deadline })
        );
    }

    #[test]
    fn wake_past_grace_window_abandons_session_without_intent() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        feed(
            &machine,
            &mut record,
            Duration::hours(8) - Duration::minutes(10),
            Activity::Exercise,
        );

        // awake for 1h 1min, past the grace window
        let step = feed(
            &machine,
            &mut record,
            Duration::hours(8) - Duration::minutes(10) + Duration::minutes(61),
            Activity::Exercise,
        );

        assert_eq!(record.phase(), Phase::Idle);
        assert!(record.original_start_time.is_none());
        assert!(record.wake_time.is_none());
        assert!(step.intent.is_none(), "nothing was pending to cancel");
        assert!(matches!(step.event, Some(Event::SessionAbandoned { .. })));
    }

    #[test]
    fn wake_within_grace_window_changes_only_the_label() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        feed(&machine, &mut record, Duration::hours(2), Activity::Passive);
        let before = record.clone();

        let step = feed(
            &machine,
            &mut record,
            Duration::hours(2) + Duration::minutes(30),
            Activity::Exercise,
        );

        assert!(step.intent.is_none());
        assert!(step.event.is_none());
        assert_eq!(record.last_activity, Some(Activity::Exercise));
        record.last_activity = before.last_activity;
        assert_eq!(record, before);
    }

    #[test]
    fn resume_with_elapsed_duration_schedules_minimal_delay() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        feed(
            &machine,
            &mut record,
            Duration::hours(8) - Duration::minutes(10),
            Activity::Passive,
        );

        // Back asleep 20 minutes later: within the grace window, but the
        // eight hours are already up.
        let offset = Duration::hours(8) + Duration::minutes(10);
        let step = feed(&machine, &mut record, offset, Activity::Asleep);

        let deadline = base() + offset + Duration::seconds(1);
        assert_eq!(record.scheduled_alarm_time, Some(deadline));
        assert_eq!(
            step.intent,
            Some(SchedulingIntent::Schedule { at: deadline })
        );
    }

    #[test]
    fn unknown_classification_updates_only_the_label() {
        let machine = machine();
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        let before = record.clone();

        let step = feed(&machine, &mut record, Duration::hours(1), Activity::Unknown);

        assert!(step.intent.is_none());
        assert_eq!(record.last_activity, Some(Activity::Unknown));
        record.last_activity = before.last_activity;
        assert_eq!(record, before);
    }

    #[test]
    fn test_mode_exercise_schedules_short_alarm_once() {
        let machine = machine();
        let mut record = SleepRecord {
            test_mode: true,
            ..Default::default()
        };

        let step = feed(&machine, &mut record, Duration::zero(), Activity::Exercise);
        let deadline = base() + Duration::minutes(1);
        assert_eq!(record.scheduled_alarm_time, Some(deadline));
        assert_eq!(
            step.intent,
            Some(SchedulingIntent::Schedule { at: deadline })
        );
        assert!(record.start_time.is_none(), "no session bookkeeping");
        assert!(record.original_start_time.is_none());
        assert_eq!(record.session_count, 0);

        // A second exercise event before firing is a no-op.
        let step = feed(
            &machine,
            &mut record,
            Duration::seconds(30),
            Activity::Exercise,
        );
        assert!(step.intent.is_none());
        assert_eq!(record.scheduled_alarm_time, Some(deadline));
    }

    #[test]
    fn test_mode_asleep_still_uses_normal_duration() {
        let machine = machine();
        let mut record = SleepRecord {
            test_mode: true,
            ..Default::default()
        };
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        assert_eq!(
            record.scheduled_alarm_time,
            Some(base() + Duration::hours(8))
        );
    }

    #[test]
    fn alarm_fired_resets_all_timestamps_from_any_phase() {
        let machine = machine();

        // From Sleeping.
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        let event = machine.handle_alarm_fired(&mut record, base() + Duration::hours(8));
        assert_eq!(record.start_time, None);
        assert_eq!(record.original_start_time, None);
        assert_eq!(record.wake_time, None);
        assert_eq!(record.scheduled_alarm_time, None);
        assert_eq!(record.session_count, 1, "count survives the reset");
        match event {
            Event::AlarmFired {
                session,
                started_at,
                scheduled_for,
                ..
            } => {
                assert_eq!(session, 1);
                assert_eq!(started_at, Some(base()));
                assert_eq!(scheduled_for, Some(base() + Duration::hours(8)));
            }
            other => panic!("expected AlarmFired, got {other:?}"),
        }

        // From GraceWindow (stale firing): still resets, idempotently.
        let mut record = SleepRecord::default();
        feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
        feed(&machine, &mut record, Duration::hours(2), Activity::Passive);
        machine.handle_alarm_fired(&mut record, base() + Duration::hours(3));
        assert_eq!(record.phase(), Phase::Idle);
        machine.handle_alarm_fired(&mut record, base() + Duration::hours(3));
        assert_eq!(record.phase(), Phase::Idle);
    }

    #[test]
    fn every_event_updates_the_display_label() {
        let machine = machine();
        let mut record = SleepRecord::default();
        for (minutes, kind) in [
            (0, Activity::Asleep),
            (10, Activity::Unknown),
            (20, Activity::Passive),
            (30, Activity::Exercise),
        ] {
            feed(&machine, &mut record, Duration::minutes(minutes), kind);
            assert_eq!(record.last_activity, Some(kind));
        }
    }

    proptest! {
        /// Any wake gap shorter than the grace window resumes the logical
        /// session with the deadline anchored to the original start.
        /// (Ranges keep the resume inside the eight hours; past them the
        /// minimal-delay deadline applies instead, covered separately.)
        #[test]
        fn short_gaps_preserve_original_deadline(
            sleep_min in 1i64..420,
            gap_ms in 1i64..3_600_000,
        ) {
            let machine = machine();
            let mut record = SleepRecord::default();
            feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
            let wake = Duration::minutes(sleep_min);
            feed(&machine, &mut record, wake, Activity::Passive);
            feed(
                &machine,
                &mut record,
                wake + Duration::milliseconds(gap_ms),
                Activity::Asleep,
            );

            prop_assert_eq!(record.session_count, 1);
            prop_assert_eq!(
                record.scheduled_alarm_time,
                Some(base() + Duration::hours(8))
            );
        }

        /// Any wake gap at or past the grace window starts a brand-new
        /// session deadlined from the second asleep event.
        #[test]
        fn long_gaps_start_a_new_session(
            sleep_min in 1i64..470,
            extra_ms in 0i64..3_600_000,
        ) {
            let machine = machine();
            let mut record = SleepRecord::default();
            feed(&machine, &mut record, Duration::zero(), Activity::Asleep);
            let wake = Duration::minutes(sleep_min);
            feed(&machine, &mut record, wake, Activity::Passive);
            let second = wake + Duration::hours(1) + Duration::milliseconds(extra_ms);
            feed(&machine, &mut record, second, Activity::Asleep);

            prop_assert_eq!(record.session_count, 2);
            prop_assert_eq!(
                record.scheduled_alarm_time,
                Some(base() + second + Duration::hours(8))
            );
        }
    }
}
