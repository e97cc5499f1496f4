//! Time source abstraction for testability.
//!
//! Debounce windows and save intervals are measured against a `TimeSource`
//! rather than `Instant::now()` directly, so tests can drive the clock by
//! hand and exercise timing behavior without real sleeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Abstraction over monotonic time.
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    /// Get the current instant for measuring elapsed time.
    fn now(&self) -> Instant;

    /// Sleep for the specified duration.
    ///
    /// In tests this advances logical time instead of blocking.
    fn sleep(&self, duration: Duration);

    /// Calculate elapsed time since an earlier instant.
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Production implementation using actual system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeSource;

impl RealTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Test implementation with controllable time.
///
/// `now()` returns a logical instant derived from an internal counter;
/// `advance()` moves the clock forward without any real waiting.
#[derive(Debug)]
pub struct TestTimeSource {
    /// Logical time in nanoseconds since creation.
    logical_nanos: AtomicU64,
    /// Real instant at creation, used as the base for Instant arithmetic.
    base_instant: Instant,
}

impl Default for TestTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTimeSource {
    /// Create a new TestTimeSource with logical time starting at zero.
    pub fn new() -> Self {
        Self {
            logical_nanos: AtomicU64::new(0),
            base_instant: Instant::now(),
        }
    }

    /// Advance logical time by the given duration.
    pub fn advance(&self, duration: Duration) {
        self.logical_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Get the logical elapsed time since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.logical_nanos.load(Ordering::SeqCst))
    }

    /// Reset logical time to zero.
    pub fn reset(&self) {
        self.logical_nanos.store(0, Ordering::SeqCst);
    }
}

impl TimeSource for TestTimeSource {
    fn now(&self) -> Instant {
        // base_instant + logical elapsed keeps the returned Instant valid
        // for duration arithmetic against other instants from this source.
        self.base_instant + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn real_time_source_now_advances() {
        let ts = RealTimeSource::new();
        let t1 = ts.now();
        std::thread::sleep(Duration::from_millis(1));
        let t2 = ts.now();
        assert!(t2 > t1);
    }

    #[test]
    fn test_time_source_starts_at_zero() {
        let ts = TestTimeSource::new();
        assert_eq!(ts.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_time_source_advance() {
        let ts = TestTimeSource::new();
        let start = ts.now();

        ts.advance(Duration::from_secs(5));

        assert_eq!(ts.elapsed(), Duration::from_secs(5));
        assert!(ts.elapsed_since(start) >= Duration::from_secs(5));
    }

    #[test]
    fn test_time_source_sleep_advances_time() {
        let ts = TestTimeSource::new();
        let start = ts.now();

        ts.sleep(Duration::from_millis(100));

        assert_eq!(ts.elapsed(), Duration::from_millis(100));
        assert!(ts.elapsed_since(start) >= Duration::from_millis(100));
    }

    #[test]
    fn test_time_source_reset() {
        let ts = TestTimeSource::new();
        ts.advance(Duration::from_secs(10));
        ts.reset();
        assert_eq!(ts.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_time_source_thread_safe() {
        use std::thread;

        let ts = Arc::new(TestTimeSource::new());
        let ts_clone = ts.clone();

        let handle = thread::spawn(move || {
            for _ in 0..100 {
                ts_clone.advance(Duration::from_millis(1));
            }
        });

        for _ in 0..100 {
            ts.advance(Duration::from_millis(1));
        }

        handle.join().unwrap();

        assert_eq!(ts.elapsed(), Duration::from_millis(200));
    }
}
