use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const RUNNING: u8 = 0;
const PAUSE_REQUESTED: u8 = 1;
const STOP_REQUESTED: u8 = 2;

/// Cloneable cross-thread handle for pausing/resuming/stopping a running `Scheduler`. Signals
/// are edge-triggered and only take effect at the next tick boundary (spec §5 "pause is
/// edge-triggered and honored at tick boundaries"), never mid-trade.
#[derive(Debug, Clone)]
pub struct SchedulerControl(Arc<AtomicU8>);

impl SchedulerControl {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RUNNING)))
    }

    pub fn pause(&self) {
        self.0.compare_exchange(RUNNING, PAUSE_REQUESTED, Ordering::SeqCst, Ordering::SeqCst).ok();
    }

    pub fn resume(&self) {
        self.0.compare_exchange(PAUSE_REQUESTED, RUNNING, Ordering::SeqCst, Ordering::SeqCst).ok();
    }

    pub fn stop(&self) {
        self.0.store(STOP_REQUESTED, Ordering::SeqCst);
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst) == PAUSE_REQUESTED
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst) == STOP_REQUESTED
    }
}

impl Default for SchedulerControl {
    fn default() -> Self {
        Self::new()
    }
}
