//! One-shot deadline timer.
//!
//! The host owns actual scheduling (a run-loop timer, a `setTimeout`); this
//! type owns the deadline. Host timers may fire slightly early, so a poll
//! before the deadline asks to be re-armed for the remainder instead of
//! firing or giving up.

use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// What the host should do after polling the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPoll {
    /// The deadline passed; the timer is now disarmed.
    Fire,
    /// Called early; schedule another callback after the residual delay.
    Rearm(Duration),
    /// Nothing armed (never set, cancelled, or already fired).
    Idle,
}

#[derive(Debug, Clone, Default)]
pub struct DeadlineTimer {
    deadline: Option<DateTime<Utc>>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer `after` from now. Returns the deadline.
    pub fn arm(&mut self, clock: &dyn Clock, after: Duration) -> Result<DateTime<Utc>> {
        let delta = chrono::Duration::from_std(after)
            .map_err(|_| PlaybackError::Config(format!("timer delay out of range: {:?}", after)))?;
        let deadline = clock
            .now()
            .checked_add_signed(delta)
            .ok_or_else(|| PlaybackError::Config(format!("timer delay out of range: {:?}", after)))?;
        self.deadline = Some(deadline);
        Ok(deadline)
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Check the deadline. Returns [`TimerPoll::Fire`] at most once per arm.
    pub fn poll(&mut self, clock: &dyn Clock) -> TimerPoll {
        let Some(deadline) = self.deadline else {
            return TimerPoll::Idle;
        };

        let now = clock.now();
        if now >= deadline {
            self.deadline = None;
            return TimerPoll::Fire;
        }

        match (deadline - now).to_std() {
            Ok(residual) if !residual.is_zero() => TimerPoll::Rearm(residual),
            _ => {
                self.deadline = None;
                TimerPoll::Fire
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct TestClock(Mutex<DateTime<Utc>>);

    impl TestClock {
        fn new() -> Self {
            Self(Mutex::new(Utc::now()))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    #[test]
    fn fires_exactly_once() {
        let clock = TestClock::new();
        let mut timer = DeadlineTimer::new();
        timer.arm(&clock, Duration::from_secs(60)).unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(timer.poll(&clock), TimerPoll::Fire);
        assert_eq!(timer.poll(&clock), TimerPoll::Idle);
        assert!(!timer.is_armed());
    }

    #[test]
    fn early_poll_rearms_for_residual() {
        let clock = TestClock::new();
        let mut timer = DeadlineTimer::new();
        timer.arm(&clock, Duration::from_secs(10)).unwrap();

        clock.advance(Duration::from_millis(9_950));
        assert_eq!(timer.poll(&clock), TimerPoll::Rearm(Duration::from_millis(50)));
        assert!(timer.is_armed());

        clock.advance(Duration::from_millis(50));
        assert_eq!(timer.poll(&clock), TimerPoll::Fire);
    }

    #[test]
    fn cancel_disarms() {
        let clock = TestClock::new();
        let mut timer = DeadlineTimer::new();
        timer.arm(&clock, Duration::from_secs(1)).unwrap();
        timer.cancel();

        clock.advance(Duration::from_secs(2));
        assert_eq!(timer.poll(&clock), TimerPoll::Idle);
    }

    #[test]
    fn rejects_out_of_range_delay() {
        let clock = TestClock::new();
        let mut timer = DeadlineTimer::new();
        assert!(timer.arm(&clock, Duration::MAX).is_err());
        assert!(!timer.is_armed());
    }
}
