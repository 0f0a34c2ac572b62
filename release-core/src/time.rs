//! Monotonic timestamp abstraction shared by firmware and host targets.
//!
//! The core never reads a clock itself. Callers pass the current instant into
//! every operation that needs one, which keeps the logic deterministic under
//! test and lets each target bring its own timer (`embassy_time` on the MCU,
//! `std::time::Instant` on the host).

use core::ops::Add;
use core::time::Duration;

/// Monotonic instant type usable by the feedback scheduler and telemetry.
pub trait Timestamp: Copy + Ord + Add<Duration, Output = Self> {}

impl<T> Timestamp for T where T: Copy + Ord + Add<Duration, Output = T> {}

/// Whole-second helper used wherever the state machine hands numbers to
/// timing-aware collaborators.
pub const fn seconds(value: u32) -> Duration {
    Duration::from_secs(value as u64)
}
