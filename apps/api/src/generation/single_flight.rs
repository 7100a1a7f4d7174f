use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Entry-point guard that keeps workflow runs from overlapping.
///
/// Overlapping runs would share the cached client and interleave progress, so the
/// generate handler refuses a second run while one holds the permit.
#[derive(Debug, Default)]
pub struct SingleFlight {
    running: AtomicBool,
}

/// Held for the duration of a run; releases the guard on drop.
#[derive(Debug)]
pub struct FlightPermit {
    guard: Arc<SingleFlight>,
}

impl SingleFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a permit, or `None` if a run is already in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Option<FlightPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit {
                guard: Arc::clone(self),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}
