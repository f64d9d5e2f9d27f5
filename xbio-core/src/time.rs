//! Time management for the sensing node
//!
//! Two clocks matter to the core:
//! - a monotonic millisecond counter ([`Millis`]) that wraps at `u32::MAX`,
//!   used for every timeout and pacing decision
//! - an optional wall clock ([`Timestamp`], Unix milliseconds), used only
//!   for session metadata and filenames
//!
//! Interval checks always go through [`elapsed_ms`], which subtracts with
//! wrapping arithmetic so a counter rollover mid-phase still yields the
//! right elapsed time.

use core::cell::Cell;

/// Monotonic milliseconds since boot, wrapping
pub type Millis = u32;

/// Wall-clock milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Source of time for the system
pub trait TimeSource {
    /// Monotonic counter in milliseconds
    fn now_ms(&self) -> Millis;

    /// Wall-clock time, if the device has one (RTC or phone sync)
    fn unix_ms(&self) -> Option<Timestamp>;

    /// Wall-clock time, falling back to uptime when no wall clock is known
    fn timestamp(&self) -> Timestamp {
        self.unix_ms().unwrap_or(self.now_ms() as Timestamp)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }

    fn unix_ms(&self) -> Option<Timestamp> {
        (**self).unix_ms()
    }
}

/// Milliseconds from `since` to `now` on the wrapping counter
#[inline]
pub const fn elapsed_ms(since: Millis, now: Millis) -> Millis {
    now.wrapping_sub(since)
}

/// Controllable clock for tests and simulation
///
/// Uses interior mutability so one clock can be shared by reference
/// between the acquisition machine, the transfer engine and the test.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    now: Cell<Millis>,
    wall: Cell<Option<Timestamp>>,
}

impl MockTimeSource {
    /// Clock starting at `start_ms` with no wall clock
    pub const fn new(start_ms: Millis) -> Self {
        Self {
            now: Cell::new(start_ms),
            wall: Cell::new(None),
        }
    }

    /// Clock with a wall-clock base that advances with the counter
    pub fn with_wall_clock(start_ms: Millis, unix_ms: Timestamp) -> Self {
        let clock = Self::new(start_ms);
        clock.wall.set(Some(unix_ms));
        clock
    }

    /// Move both clocks forward
    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get().wrapping_add(ms));
        if let Some(wall) = self.wall.get() {
            self.wall.set(Some(wall + ms as Timestamp));
        }
    }

    /// Jump the monotonic counter
    pub fn set(&self, now_ms: Millis) {
        self.now.set(now_ms);
    }
}

impl TimeSource for MockTimeSource {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }

    fn unix_ms(&self) -> Option<Timestamp> {
        self.wall.get()
    }
}

/// Host clock: `Instant` for the counter, `SystemTime` for wall time
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemClock {
    boot: std::time::Instant,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Clock whose counter starts at zero now
    pub fn new() -> Self {
        Self {
            boot: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
    fn now_ms(&self) -> Millis {
        // Truncation is the wrap of a 32-bit hardware counter.
        self.boot.elapsed().as_millis() as Millis
    }

    fn unix_ms(&self) -> Option<Timestamp> {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as Timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_time_advances() {
        let time = MockTimeSource::new(1000);
        assert_eq!(time.now_ms(), 1000);

        time.advance(500);
        assert_eq!(time.now_ms(), 1500);
        assert_eq!(time.unix_ms(), None);
        assert_eq!(time.timestamp(), 1500);
    }

    #[test]
    fn elapsed_survives_wraparound() {
        let start = u32::MAX - 100;
        let now = start.wrapping_add(250);
        assert!(now < start);
        assert_eq!(elapsed_ms(start, now), 250);
    }

    #[test]
    fn wall_clock_follows_counter() {
        let time = MockTimeSource::with_wall_clock(0, 1_700_000_000_000);
        time.advance(1234);
        assert_eq!(time.unix_ms(), Some(1_700_000_001_234));
    }

    #[test]
    fn shared_reference_is_a_time_source() {
        fn read<T: TimeSource>(t: T) -> Millis {
            t.now_ms()
        }
        let time = MockTimeSource::new(42);
        assert_eq!(read(&time), 42);
    }
}
