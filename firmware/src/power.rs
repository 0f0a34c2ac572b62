//! Idle tracking for the sleep negotiation.
//!
//! The transport stamps every datagram into an [`ActivityMonitor`]. Once the
//! link has been quiet for [`IDLE_AFTER`] the power task asks the services
//! for a sleep window and acts on whatever they grant.

use core::time::Duration;

use portable_atomic::{AtomicU64, Ordering};
use release_core::sleep::{SleepGrant, SleepMode};

use crate::clock::FirmwareInstant;

/// Interval between idle checks.
pub const POWER_POLL: Duration = Duration::from_secs(60);

/// Quiet period before sleep is requested.
pub const IDLE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Window asked for on every request.
pub const SLEEP_REQUEST: Duration = Duration::from_secs(10 * 60);

/// Mode asked for on every request.
pub const SLEEP_MODE: SleepMode = SleepMode::DeepSleep;

pub struct ActivityMonitor {
    last_activity_us: AtomicU64,
}

impl ActivityMonitor {
    pub const fn new() -> Self {
        Self {
            last_activity_us: AtomicU64::new(0),
        }
    }

    pub fn note(&self, now: FirmwareInstant) {
        self.last_activity_us
            .fetch_max(now.as_micros(), Ordering::AcqRel);
    }

    pub fn idle_for(&self, now: FirmwareInstant) -> Duration {
        let last = self.last_activity_us.load(Ordering::Acquire);
        Duration::from_micros(now.as_micros().saturating_sub(last))
    }

    pub fn should_request_sleep(&self, now: FirmwareInstant) -> bool {
        self.idle_for(now) >= IDLE_AFTER
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// What the power task does with a grant.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SleepAction {
    /// Keep running.
    Stay,
    /// Let the executor idle until the next poll.
    Idle,
    /// Wait out the window, then reset the MCU.
    ResetAfter(Duration),
}

pub fn action_for(grant: SleepGrant) -> SleepAction {
    if grant.duration.is_zero() {
        return SleepAction::Stay;
    }
    match grant.mode {
        SleepMode::None => SleepAction::Stay,
        SleepMode::LightSleep => SleepAction::Idle,
        SleepMode::DeepSleep => SleepAction::ResetAfter(grant.duration),
    }
}
