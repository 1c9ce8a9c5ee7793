use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source used for pacing frame feeds and stall detection.
///
/// - now(): returns a monotonic Instant
/// - sleep(): waits for the provided duration (implementations may simulate)
/// - ms_since(): elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis().min(u128::from(u64::MAX)) as u64
    }
}

/// Real-time clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now() = origin + offset; sleep(d) advances the offset without blocking.
/// Clones share the same offset, so a test can hand one clone to a feed
/// thread and advance time from another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
