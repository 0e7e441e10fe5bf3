//! Time sources. The logger never asks the operating system for the time
//! directly, so a session can be replayed on a [ManualClock].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Something that can tell how much time has passed since it was created.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&mut self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time, so a
/// test can keep one handle and give the other to a session.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// A clock standing at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time, in seconds.
    pub fn set_secs(&self, secs: f64) {
        self.now.set(Duration::from_secs_f64(secs));
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Duration {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_handles_share_time() {
        let handle = ManualClock::new();
        let mut clock = handle.clone();
        assert_eq!(clock.now(), Duration::ZERO);

        handle.set_secs(2.5);
        assert_eq!(clock.now(), Duration::from_millis(2500));

        handle.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_secs(3));
    }

    #[test]
    fn system_clock_moves_forward() {
        let mut clock = SystemClock::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
