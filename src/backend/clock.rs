use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Ticks between 1601-01-01 and 1970-01-01 UTC.
const UNIX_EPOCH_FILE_TIME: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Converts a UTC instant to file-time ticks (100 ns since 1601-01-01 UTC).
pub fn file_time(instant: DateTime<Utc>) -> i64 {
    instant.timestamp() * TICKS_PER_SECOND + i64::from(instant.timestamp_subsec_nanos()) / 100 + UNIX_EPOCH_FILE_TIME
}

pub trait Clock: Send + Sync {
    /// Current time in file-time ticks.
    fn now(&self) -> i64;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> i64 {
        file_time(Utc::now())
    }
}

pub fn mocked_clock(start: i64) -> (MockClock, MockClockController) {
    let (tx, rx) = watch::channel(start);
    (MockClock { current_time: rx }, MockClockController { current_time: tx })
}

#[derive(Clone)]
pub struct MockClock {
    current_time: watch::Receiver<i64>,
}

impl Clock for MockClock {
    fn now(&self) -> i64 {
        *self.current_time.borrow()
    }
}

pub struct MockClockController {
    current_time: watch::Sender<i64>,
}

impl MockClockController {
    pub fn current_time(&self) -> i64 {
        *self.current_time.borrow()
    }

    pub fn advance(&self, ticks: i64) {
        self.current_time.send_modify(|now| *now += ticks);
    }

    pub fn set(&self, ticks: i64) {
        self.current_time.send_replace(ticks);
    }
}

/// Hands out transaction timestamps that strictly increase, even when the wall clock stalls or
/// steps backwards.
pub(crate) struct TransactionClock {
    clock: Arc<dyn Clock>,
    last: AtomicI64,
}

impl TransactionClock {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        TransactionClock {
            clock,
            last: AtomicI64::new(i64::MIN),
        }
    }

    pub(crate) fn raw(&self) -> i64 {
        self.clock.now()
    }

    pub(crate) fn next(&self) -> i64 {
        let now = self.clock.now();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last.saturating_add(1))))
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_time_epochs() {
        assert_eq!(file_time(Utc.timestamp_opt(0, 0).unwrap()), UNIX_EPOCH_FILE_TIME);
        assert_eq!(file_time(Utc.timestamp_opt(1, 500).unwrap()), UNIX_EPOCH_FILE_TIME + TICKS_PER_SECOND + 5);
    }

    #[test]
    fn transaction_time_strictly_increases() {
        let (clock, controller) = mocked_clock(1_000);
        let times = TransactionClock::new(Arc::new(clock));

        assert_eq!(times.next(), 1_000);
        assert_eq!(times.next(), 1_001);

        controller.set(500);
        assert_eq!(times.next(), 1_002);

        controller.advance(10_000);
        assert_eq!(times.next(), 10_500);
        assert_eq!(controller.current_time(), 10_500);
    }
}
