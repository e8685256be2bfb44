use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Abstraction over "now" so components that reason about lease expiry,
/// rate-limit windows, and scheduled sweeps can be driven deterministically
/// in tests instead of racing the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock, backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A steppable clock for tests. Starts at its construction time (or an
/// explicit instant) and only moves when `advance` is called.
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.millis.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_on_demand() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now().timestamp_millis(), start.timestamp_millis());
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(
            clock.now().timestamp_millis(),
            start.timestamp_millis() + 30_000
        );
    }
}
