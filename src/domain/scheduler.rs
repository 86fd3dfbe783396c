//! Cancellable periodic runner.
//!
//! Time is read and waited on through a [`Clock`] so tests can drive the loop
//! with virtual time. A [`CancelToken`] stops the loop between passes and
//! interrupts any sleep in progress.

use chrono::{DateTime, Utc};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::DeskError;
use crate::ports::telemetry_port::{TelemetryEvent, TelemetryPort};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Waits for `duration` unless cancelled first. Returns `false` when the
    /// wait was cut short by cancellation.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

/// Wall clock. Sleeps in short slices so cancellation is noticed promptly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

const SLEEP_SLICE: Duration = Duration::from_millis(250);

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
        !cancel.is_cancelled()
    }
}

/// Virtual clock: `sleep` advances time instantly and records the request.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += delta;
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.sleeps
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(duration);
        self.advance(duration);
        !cancel.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub interval: Duration,
    pub retry_delay: Duration,
    /// Stop after this many attempts. `None` runs until cancelled.
    pub max_passes: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            interval: Duration::from_secs(3600),
            retry_delay: Duration::from_secs(60),
            max_passes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleSummary {
    pub attempts: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: bool,
}

pub struct Scheduler<'a> {
    config: ScheduleConfig,
    clock: &'a dyn Clock,
    cancel: CancelToken,
    telemetry: &'a dyn TelemetryPort,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "pass panicked".to_string()
    }
}

impl<'a> Scheduler<'a> {
    pub fn new(
        config: ScheduleConfig,
        clock: &'a dyn Clock,
        cancel: CancelToken,
        telemetry: &'a dyn TelemetryPort,
    ) -> Self {
        Scheduler {
            config,
            clock,
            cancel,
            telemetry,
        }
    }

    /// Runs `pass` repeatedly. Pass numbers start at 1 and increase on every
    /// attempt, including retries. A failing or panicking pass is reported and
    /// followed by the retry delay instead of the full interval.
    pub fn run<F>(&self, mut pass: F) -> ScheduleSummary
    where
        F: FnMut(u64) -> Result<(), DeskError>,
    {
        let mut summary = ScheduleSummary::default();
        loop {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return summary;
            }
            if self
                .config
                .max_passes
                .is_some_and(|max| summary.attempts >= max)
            {
                return summary;
            }

            summary.attempts += 1;
            let number = summary.attempts;
            let result = catch_unwind(AssertUnwindSafe(|| pass(number)));
            let failure = match result {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };

            let delay = match failure {
                None => {
                    summary.succeeded += 1;
                    self.telemetry
                        .record(TelemetryEvent::PassCompleted { pass: number });
                    self.config.interval
                }
                Some(reason) => {
                    summary.failed += 1;
                    self.telemetry.record(TelemetryEvent::PassFailed {
                        pass: number,
                        reason,
                    });
                    self.config.retry_delay
                }
            };

            if self
                .config
                .max_passes
                .is_some_and(|max| summary.attempts >= max)
            {
                return summary;
            }
            if !self.clock.sleep(delay, &self.cancel) {
                summary.cancelled = true;
                return summary;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_telemetry::MemoryTelemetry;

    fn start() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn config(max: u64) -> ScheduleConfig {
        ScheduleConfig {
            max_passes: Some(max),
            ..ScheduleConfig::default()
        }
    }

    #[test]
    fn runs_on_interval_with_virtual_time() {
        let clock = ManualClock::new(start());
        let telemetry = MemoryTelemetry::new();
        let scheduler = Scheduler::new(config(3), &clock, CancelToken::new(), &telemetry);

        let summary = scheduler.run(|_| Ok(()));
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.succeeded, 3);
        assert!(!summary.cancelled);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3600); 2]);
        assert_eq!(clock.now(), start() + chrono::Duration::seconds(7200));
    }

    #[test]
    fn failures_and_panics_retry_after_delay() {
        let clock = ManualClock::new(start());
        let telemetry = MemoryTelemetry::new();
        let scheduler = Scheduler::new(config(3), &clock, CancelToken::new(), &telemetry);

        let summary = scheduler.run(|n| match n {
            1 => Err(DeskError::RunState {
                reason: "disk full".into(),
            }),
            2 => panic!("feed exploded"),
            _ => Ok(()),
        });
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60); 2]);

        let events = telemetry.events();
        assert!(matches!(&events[0], TelemetryEvent::PassFailed { pass: 1, reason } if reason.contains("disk full")));
        assert!(matches!(&events[1], TelemetryEvent::PassFailed { pass: 2, reason } if reason.contains("feed exploded")));
        assert_eq!(events[2], TelemetryEvent::PassCompleted { pass: 3 });
    }

    #[test]
    fn cancel_stops_between_passes() {
        let clock = ManualClock::new(start());
        let telemetry = MemoryTelemetry::new();
        let cancel = CancelToken::new();
        let scheduler = Scheduler::new(ScheduleConfig::default(), &clock, cancel.clone(), &telemetry);

        let summary = scheduler.run(|n| {
            if n == 2 {
                cancel.cancel();
            }
            Ok(())
        });
        assert_eq!(summary.attempts, 2);
        assert!(summary.cancelled);
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[test]
    fn pre_cancelled_scheduler_never_runs() {
        let clock = ManualClock::new(start());
        let telemetry = MemoryTelemetry::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let scheduler = Scheduler::new(ScheduleConfig::default(), &clock, cancel, &telemetry);
        let summary = scheduler.run(|_| Ok(()));
        assert_eq!(summary.attempts, 0);
        assert!(summary.cancelled);
    }

    #[test]
    fn system_clock_sleep_returns_early_when_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!SystemClock.sleep(Duration::from_secs(3600), &cancel));
    }
}
