//! Strictly increasing write stamps.

use fieldbook_model::{Clock, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;

/// Issues write stamps from a clock, never repeating or going backwards.
pub(crate) struct Stamper {
    clock: Arc<dyn Clock>,
    last: Mutex<Timestamp>,
}

impl Stamper {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: Mutex::new(0),
        }
    }

    /// Returns `max(now, last + 1)` and records it.
    pub(crate) fn next(&self) -> Timestamp {
        let mut last = self.last.lock();
        let stamp = self.clock.now_millis().max(*last + 1);
        *last = stamp;
        stamp
    }

    /// Makes later stamps exceed an externally supplied one.
    pub(crate) fn observe(&self, stamp: Timestamp) {
        let mut last = self.last.lock();
        if stamp > *last {
            *last = stamp;
        }
    }
}

impl std::fmt::Debug for Stamper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stamper")
            .field("last", &*self.last.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldbook_model::ManualClock;

    #[test]
    fn stamps_increase_when_clock_stalls() {
        let clock = Arc::new(ManualClock::new(100));
        let stamper = Stamper::new(clock.clone());
        assert_eq!(stamper.next(), 100);
        assert_eq!(stamper.next(), 101);
        clock.set(500);
        assert_eq!(stamper.next(), 500);
        stamper.observe(900);
        assert_eq!(stamper.next(), 901);
    }
}
