//! Time sources for the scheduler.

use std::cell::Cell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Wall-clock milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Nanoseconds from an arbitrary origin, only used for ordering.
    fn now_ns(&self) -> u128;

    /// Block until `due_ms`, or return at once for clocks that do not sleep.
    fn wait_until(&self, due_ms: u64);
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }

    fn now_ns(&self) -> u128 {
        self.origin.elapsed().as_nanos()
    }

    fn wait_until(&self, due_ms: u64) {
        let now = self.now_ms();
        if due_ms > now {
            thread::sleep(Duration::from_millis(due_ms - now));
        }
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    ms: Rc<Cell<u64>>,
    ns: Rc<Cell<u128>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        let clock = Self::default();
        clock.ms.set(start_ms);
        clock
    }

    pub fn advance(&self, ms: u64) {
        self.ms.set(self.ms.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.ms.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.get()
    }

    fn now_ns(&self) -> u128 {
        // Strictly increasing so tasks created in the same millisecond keep their order.
        let ns = self.ns.get() + 1;
        self.ns.set(ns);
        u128::from(self.ms.get()) * 1_000_000 + ns
    }

    /// Jumps straight to `due_ms`.
    fn wait_until(&self, due_ms: u64) {
        if due_ms > self.ms.get() {
            self.ms.set(due_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(500);
        assert_eq!(other.now_ms(), 1_500);
        other.wait_until(2_000);
        assert_eq!(clock.now_ms(), 2_000);
        let a = clock.now_ns();
        assert!(clock.now_ns() > a);
    }
}
