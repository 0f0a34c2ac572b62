//! Gate between the one-second tick and write commands.
//!
//! A tick that falls due while a write command holds the gate is counted and
//! replayed by the next tick that finds the gate open, so no second is lost.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};
use release_core::service::TickControl;

pub struct TickGate {
    paused: AtomicBool,
    deferred: AtomicU32,
}

impl TickGate {
    pub const fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            deferred: AtomicU32::new(0),
        }
    }

    /// Number of ticks to run now; zero while paused.
    pub fn claim(&self) -> u32 {
        if self.paused.load(Ordering::Acquire) {
            self.deferred.fetch_add(1, Ordering::AcqRel);
            0
        } else {
            1 + self.deferred.swap(0, Ordering::AcqRel)
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

impl Default for TickGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TickControl for TickGate {
    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }
}
