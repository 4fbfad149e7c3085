use std::sync::Mutex;
use std::sync::PoisonError;

use super::*;

/// Source of the current time for all elapsed-time decisions
///
pub trait Clock: fmt::Debug + Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock
///
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven clock; time only moves through [`FakeClock::step`] and
/// [`FakeClock::set_time`].
///
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<Timestamp>,
}

impl FakeClock {
    pub fn new(now: Timestamp) -> Self {
        let now = Mutex::new(now);
        Self { now }
    }

    /// Fake clock starting at the current wall time, truncated to whole seconds
    /// so it survives an RFC 3339 round trip unchanged
    ///
    pub fn from_wall_clock() -> Self {
        let now = Timestamp::now();
        let now = Timestamp::from_second(now.as_second()).unwrap_or(now);
        Self::new(now)
    }

    pub fn step(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.checked_add(signed(duration)).unwrap_or(Timestamp::MAX);
    }

    pub fn set_time(&self, time: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
