//! Embassy time as seen by `release-core`.

use core::ops::Add;
use core::time::Duration;

use embassy_time::{Duration as EmbassyDuration, Instant};

/// Monotonic instant handed to the key release service.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl From<FirmwareInstant> for Instant {
    fn from(instant: FirmwareInstant) -> Self {
        instant.0
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(
            self.0
                .checked_add(core_duration_to_embassy(rhs))
                .unwrap_or(Instant::MAX),
        )
    }
}

pub fn core_duration_to_embassy(duration: Duration) -> EmbassyDuration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    EmbassyDuration::from_micros(micros)
}
