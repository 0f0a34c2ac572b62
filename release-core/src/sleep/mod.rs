//! Low-power negotiation.
//!
//! The device must never sleep through a release it owns. Deep sleep resets
//! the MCU on wake (dropping every key), so it is only granted when at most one
//! timer is pending and that timer would expire inside the requested window.
//! Everything else is downgraded to light sleep, which keeps the tick running.

use core::fmt;
use core::time::Duration;

use crate::time::seconds;

/// Requested or granted power mode, ordered from weakest to deepest.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SleepMode {
    None,
    LightSleep,
    DeepSleep,
}

impl SleepMode {
    /// Deep sleep becomes light sleep; weaker modes are kept as is.
    pub const fn downgraded(self) -> Self {
        match self {
            SleepMode::DeepSleep => SleepMode::LightSleep,
            other => other,
        }
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SleepMode::None => "none",
            SleepMode::LightSleep => "light",
            SleepMode::DeepSleep => "deep",
        })
    }
}

/// Permitted sleep window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SleepGrant {
    pub duration: Duration,
    pub mode: SleepMode,
}

impl SleepGrant {
    pub const fn new(duration: Duration, mode: SleepMode) -> Self {
        Self { duration, mode }
    }

    /// Combines two grants, keeping the shorter window and the weaker mode.
    #[must_use]
    pub fn restrict(self, other: SleepGrant) -> Self {
        Self {
            duration: self.duration.min(other.duration),
            mode: self.mode.min(other.mode),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SleepGrant {
    fn format(&self, fmt: defmt::Formatter<'_>) {
        defmt::write!(
            fmt,
            "SleepGrant {{ ms: {=u64}, mode: {} }}",
            self.duration.as_millis() as u64,
            self.mode
        );
    }
}

/// Computes the sleep window allowed by the running timers.
///
/// `running_remaining` yields the remaining seconds of every running timer.
pub fn negotiate<R>(running_remaining: R, requested: Duration, mode: SleepMode) -> SleepGrant
where
    R: IntoIterator<Item = u32>,
{
    let mut running = 0usize;
    let mut furthest = 0u32;
    for remaining in running_remaining {
        running += 1;
        furthest = furthest.max(remaining);
    }

    match running {
        0 => SleepGrant::new(requested, mode),
        1 => {
            let until_release = seconds(furthest);
            if mode == SleepMode::DeepSleep && until_release <= requested {
                SleepGrant::new(until_release, SleepMode::DeepSleep)
            } else {
                SleepGrant::new(requested, mode.downgraded())
            }
        }
        _ => SleepGrant::new(requested.min(seconds(furthest)), mode.downgraded()),
    }
}
