use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("periodic task already registered: {0}")]
    DuplicateTask(String),
    #[error("periodic task {0} needs a positive period")]
    ZeroPeriod(String),
    #[error("scheduler has been shut down")]
    ShutDown,
    #[error("deadline {delay_ms}ms from now is past the end of the clock")]
    DeadlineOverflow { delay_ms: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireKind {
    Periodic { name: String },
    OneShot { timer: TimerId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<J> {
    pub job: J,
    pub due: DateTime<Utc>,
    pub kind: FireKind,
}

#[derive(Debug, Clone)]
struct PeriodicTask<J> {
    every: Duration,
    next_due: DateTime<Utc>,
    seq: u64,
    job: J,
}

#[derive(Debug, Clone)]
struct OneShot<J> {
    due: DateTime<Utc>,
    job: J,
}

enum Slot {
    Periodic(String),
    OneShot(TimerId),
}

/// Owns every timer in the core. Time only moves when the owner calls
/// [`Scheduler::pop_due`] or [`Scheduler::settle`].
#[derive(Debug)]
pub struct Scheduler<J> {
    now: DateTime<Utc>,
    periodic: BTreeMap<String, PeriodicTask<J>>,
    one_shots: BTreeMap<TimerId, OneShot<J>>,
    next_seq: u64,
    shut_down: bool,
}

impl<J: Clone> Scheduler<J> {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            periodic: BTreeMap::new(),
            one_shots: BTreeMap::new(),
            next_seq: 0,
            shut_down: false,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn ensure_running(&self) -> Result<(), SchedulerError> {
        if self.shut_down {
            return Err(SchedulerError::ShutDown);
        }
        Ok(())
    }

    pub fn start_periodic(
        &mut self,
        name: impl Into<String>,
        every: Duration,
        job: J,
    ) -> Result<(), SchedulerError> {
        self.ensure_running()?;
        let name = name.into();
        if every <= Duration::zero() {
            return Err(SchedulerError::ZeroPeriod(name));
        }
        if self.periodic.contains_key(&name) {
            return Err(SchedulerError::DuplicateTask(name));
        }
        let next_due = self.deadline_after(every)?;
        let seq = self.take_seq();
        debug!(
            event = "periodic_started",
            task = %name,
            every_ms = every.num_milliseconds()
        );
        self.periodic.insert(
            name,
            PeriodicTask {
                every,
                next_due,
                seq,
                job,
            },
        );
        Ok(())
    }

    pub fn stop_periodic(&mut self, name: &str) -> bool {
        let removed = self.periodic.remove(name).is_some();
        if removed {
            debug!(event = "periodic_stopped", task = %name);
        }
        removed
    }

    pub fn schedule_once(&mut self, delay: Duration, job: J) -> Result<TimerId, SchedulerError> {
        self.ensure_running()?;
        let due = self.deadline_after(delay.max(Duration::zero()))?;
        let timer = TimerId(self.take_seq());
        self.one_shots.insert(timer, OneShot { due, job });
        Ok(timer)
    }

    pub fn cancel(&mut self, timer: TimerId) -> bool {
        self.one_shots.remove(&timer).is_some()
    }

    /// Claims the earliest item due at or before `now`. Ties go to the item
    /// registered first. The clock moves to the claimed item's due time.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Fired<J>> {
        if self.shut_down {
            return None;
        }

        let mut selected: Option<(DateTime<Utc>, u64, Slot)> = None;
        for (name, task) in &self.periodic {
            if task.next_due > now {
                continue;
            }
            let earlier = selected
                .as_ref()
                .map(|(due, seq, _)| (task.next_due, task.seq) < (*due, *seq))
                .unwrap_or(true);
            if earlier {
                selected = Some((task.next_due, task.seq, Slot::Periodic(name.clone())));
            }
        }
        for (timer, shot) in &self.one_shots {
            if shot.due > now {
                continue;
            }
            let earlier = selected
                .as_ref()
                .map(|(due, seq, _)| (shot.due, timer.0) < (*due, *seq))
                .unwrap_or(true);
            if earlier {
                selected = Some((shot.due, timer.0, Slot::OneShot(*timer)));
            }
        }

        let (due, _, slot) = selected?;
        if due > self.now {
            self.now = due;
        }
        match slot {
            Slot::Periodic(name) => {
                let task = self.periodic.get_mut(&name)?;
                let job = task.job.clone();
                match task.next_due.checked_add_signed(task.every) {
                    Some(next_due) => task.next_due = next_due,
                    None => {
                        // no representable next period; this firing is the last
                        warn!(event = "periodic_retired", task = %name);
                        self.periodic.remove(&name);
                    }
                }
                Some(Fired {
                    job,
                    due,
                    kind: FireKind::Periodic { name },
                })
            }
            Slot::OneShot(timer) => {
                let shot = self.one_shots.remove(&timer)?;
                Some(Fired {
                    job: shot.job,
                    due,
                    kind: FireKind::OneShot { timer },
                })
            }
        }
    }

    pub fn settle(&mut self, now: DateTime<Utc>) {
        if now > self.now {
            self.now = now;
        }
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        if self.shut_down {
            return None;
        }
        let periodic = self.periodic.values().map(|task| task.next_due);
        let one_shots = self.one_shots.values().map(|shot| shot.due);
        periodic.chain(one_shots).min()
    }

    pub fn periodic_count(&self) -> usize {
        self.periodic.len()
    }

    pub fn pending_count(&self) -> usize {
        self.one_shots.len()
    }

    /// Cancels every periodic task and pending one-shot. Returns how many were live.
    pub fn shutdown(&mut self) -> usize {
        let cancelled = self.periodic.len() + self.one_shots.len();
        self.periodic.clear();
        self.one_shots.clear();
        if !self.shut_down {
            info!(event = "scheduler_shutdown", cancelled = cancelled);
        }
        self.shut_down = true;
        cancelled
    }

    fn deadline_after(&self, delay: Duration) -> Result<DateTime<Utc>, SchedulerError> {
        self.now
            .checked_add_signed(delay)
            .ok_or(SchedulerError::DeadlineOverflow {
                delay_ms: delay.num_milliseconds(),
            })
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

pub fn millis(ms: u64) -> Duration {
    Duration::milliseconds(ms.min(i64::MAX as u64) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms)
            .single()
            .expect("valid test timestamp")
    }

    fn drain(scheduler: &mut Scheduler<&'static str>, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some(item) = scheduler.pop_due(now) {
            fired.push(item.job);
        }
        scheduler.settle(now);
        fired
    }

    #[test]
    fn periodic_tasks_fire_once_per_elapsed_period() {
        let mut scheduler = Scheduler::new(ts(0));
        scheduler
            .start_periodic("telemetry", millis(1_200), "tick")
            .expect("start");

        assert!(drain(&mut scheduler, ts(1_000)).is_empty());
        assert_eq!(drain(&mut scheduler, ts(1_200)), vec!["tick"]);
        assert_eq!(drain(&mut scheduler, ts(4_900)), vec!["tick", "tick", "tick"]);
        assert_eq!(scheduler.next_deadline(), Some(ts(6_000)));
    }

    #[test]
    fn items_fire_in_due_order_with_registration_tiebreak() {
        let mut scheduler = Scheduler::new(ts(0));
        scheduler
            .start_periodic("metrics", millis(2_000), "metrics")
            .expect("start");
        scheduler
            .schedule_once(millis(2_000), "restart")
            .expect("schedule");
        scheduler
            .schedule_once(millis(500), "early")
            .expect("schedule");

        assert_eq!(
            drain(&mut scheduler, ts(2_000)),
            vec!["early", "metrics", "restart"]
        );
    }

    #[test]
    fn clock_follows_fired_item_so_follow_ups_are_relative() {
        let mut scheduler = Scheduler::new(ts(0));
        scheduler.schedule_once(millis(1_000), "first").expect("schedule");

        let fired = scheduler.pop_due(ts(5_000)).expect("due");
        assert_eq!(fired.due, ts(1_000));
        assert_eq!(scheduler.now(), ts(1_000));

        scheduler.schedule_once(millis(1_000), "second").expect("schedule");
        let second = scheduler.pop_due(ts(5_000)).expect("follow-up due");
        assert_eq!(second.due, ts(2_000));
    }

    #[test]
    fn cancelled_one_shot_never_fires() {
        let mut scheduler = Scheduler::new(ts(0));
        let timer = scheduler.schedule_once(millis(100), "x").expect("schedule");
        assert!(scheduler.cancel(timer));
        assert!(!scheduler.cancel(timer));
        assert!(drain(&mut scheduler, ts(1_000)).is_empty());
    }

    #[test]
    fn duplicate_and_zero_period_tasks_are_rejected() {
        let mut scheduler = Scheduler::new(ts(0));
        scheduler.start_periodic("a", millis(10), "a").expect("start");
        assert_eq!(
            scheduler.start_periodic("a", millis(10), "a"),
            Err(SchedulerError::DuplicateTask("a".to_string()))
        );
        assert_eq!(
            scheduler.start_periodic("b", millis(0), "b"),
            Err(SchedulerError::ZeroPeriod("b".to_string()))
        );
    }

    #[test]
    fn deadlines_past_the_end_of_the_clock_are_rejected() {
        let mut scheduler = Scheduler::new(ts(0));
        let huge = millis(u64::MAX);
        assert_eq!(
            scheduler.schedule_once(huge, "restart"),
            Err(SchedulerError::DeadlineOverflow {
                delay_ms: i64::MAX
            })
        );
        assert!(matches!(
            scheduler.start_periodic("slow", huge, "slow"),
            Err(SchedulerError::DeadlineOverflow { .. })
        ));
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.periodic_count(), 0);

        scheduler.schedule_once(millis(10), "ok").expect("schedule");
        assert_eq!(drain(&mut scheduler, ts(10)), vec!["ok"]);
    }

    #[test]
    fn stopped_task_no_longer_fires() {
        let mut scheduler = Scheduler::new(ts(0));
        scheduler.start_periodic("a", millis(100), "a").expect("start");
        assert!(scheduler.stop_periodic("a"));
        assert!(!scheduler.stop_periodic("a"));
        assert!(drain(&mut scheduler, ts(1_000)).is_empty());
    }

    #[test]
    fn shutdown_cancels_everything_and_blocks_new_timers() {
        let mut scheduler = Scheduler::new(ts(0));
        scheduler.start_periodic("a", millis(100), "a").expect("start");
        scheduler.start_periodic("b", millis(200), "b").expect("start");
        scheduler.schedule_once(millis(50), "once").expect("schedule");

        assert_eq!(scheduler.shutdown(), 3);
        assert_eq!(scheduler.periodic_count(), 0);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(drain(&mut scheduler, ts(10_000)).is_empty());
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(
            scheduler.schedule_once(millis(1), "late"),
            Err(SchedulerError::ShutDown)
        );
        assert_eq!(scheduler.shutdown(), 0);
    }
}
