//! Per-actuator release timer.
//!
//! A [`ReleaseDuration`] pairs the mutable countdown state of one hook with its
//! immutable [`Actuator`] description. All arithmetic is whole seconds and
//! saturating; every operation keeps `elapsed + remaining <= maximum`.

use core::fmt;

use crate::actuator::Actuator;

/// Lifecycle state of a release timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DurationStatus {
    Idle,
    Armed,
    Holding,
    CountDown,
    AwaitRelease,
    Released,
    Error,
}

impl DurationStatus {
    /// Name reported on the wire by the `status` command.
    pub const fn name(self) -> &'static str {
        match self {
            DurationStatus::Idle => "Idle",
            DurationStatus::Armed => "Armed",
            DurationStatus::Holding => "Holding",
            DurationStatus::CountDown => "CountDown",
            DurationStatus::AwaitRelease => "AwaitRelease",
            DurationStatus::Released => "Released",
            DurationStatus::Error => "Error",
        }
    }

    /// Precedence when several timers compete for the status indicator.
    pub const fn rank(self) -> u8 {
        match self {
            DurationStatus::Idle => 0,
            DurationStatus::Armed => 1,
            DurationStatus::Holding => 2,
            DurationStatus::AwaitRelease => 3,
            DurationStatus::CountDown => 4,
            DurationStatus::Released => 5,
            DurationStatus::Error => 6,
        }
    }

    /// Whether `hold`/`start` are legal from this state.
    pub const fn accepts_hold(self) -> bool {
        matches!(self, DurationStatus::Armed | DurationStatus::Holding)
    }
}

impl fmt::Display for DurationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single [`ReleaseDuration::advance`] step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Advance {
    /// Timer was not running; nothing changed.
    Stopped,
    /// One second elapsed and the timer keeps running.
    Running,
    /// The timer reached zero (or its ceiling) and is now `Released`.
    Expired,
}

impl Advance {
    pub const fn is_running(self) -> bool {
        matches!(self, Advance::Running)
    }
}

/// Mutable timer bound to one release point.
#[derive(Clone, Debug)]
pub struct ReleaseDuration<'a> {
    actuator: &'a Actuator,
    running: bool,
    elapsed_seconds: u32,
    remaining_seconds: u32,
    status: DurationStatus,
}

impl<'a> ReleaseDuration<'a> {
    pub const fn new(actuator: &'a Actuator) -> Self {
        Self {
            actuator,
            running: false,
            elapsed_seconds: 0,
            remaining_seconds: 0,
            status: DurationStatus::Idle,
        }
    }

    pub const fn actuator(&self) -> &'a Actuator {
        self.actuator
    }

    pub const fn running(&self) -> bool {
        self.running
    }

    pub const fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub const fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub const fn status(&self) -> DurationStatus {
        self.status
    }

    /// Seconds that could still be granted before hitting the ceiling.
    pub const fn available_seconds(&self) -> u32 {
        self.actuator
            .maximum_seconds
            .saturating_sub(self.elapsed_seconds)
    }

    /// Starts the default safety timer.
    pub fn arm(&mut self) {
        self.reset_to_default(DurationStatus::Armed);
    }

    /// Same numeric reset as [`Self::arm`], marked as held.
    pub fn hold(&mut self) {
        self.reset_to_default(DurationStatus::Holding);
    }

    /// Same numeric reset as [`Self::arm`], waiting on an explicit release.
    pub fn await_release(&mut self) {
        self.reset_to_default(DurationStatus::AwaitRelease);
    }

    /// Starts an explicit countdown, clamped to the ceiling.
    pub fn start(&mut self, seconds: u32) {
        self.running = true;
        self.elapsed_seconds = 0;
        self.remaining_seconds = seconds.min(self.actuator.maximum_seconds);
        self.status = DurationStatus::CountDown;
    }

    /// Extends a running timer; returns the new remaining seconds.
    ///
    /// The result never exceeds `maximum - elapsed`. Stopped timers are left
    /// untouched.
    pub fn add(&mut self, seconds: u32) -> u32 {
        if self.running {
            self.remaining_seconds = self
                .remaining_seconds
                .saturating_add(seconds)
                .min(self.available_seconds());
        }
        self.remaining_seconds
    }

    /// Consumes one second of a running timer.
    ///
    /// A timer with nothing left, or one that has reached its ceiling, is
    /// cleared to `Released`.
    pub fn advance(&mut self) -> Advance {
        if !self.running {
            return Advance::Stopped;
        }

        if self.remaining_seconds > 0 && self.elapsed_seconds < self.actuator.maximum_seconds {
            self.elapsed_seconds += 1;
            self.remaining_seconds -= 1;
        }

        if self.remaining_seconds == 0 || self.elapsed_seconds >= self.actuator.maximum_seconds {
            self.clear(DurationStatus::Released);
            Advance::Expired
        } else {
            Advance::Running
        }
    }

    /// Stops the timer and parks it in `status`.
    pub fn clear(&mut self, status: DurationStatus) {
        self.running = false;
        self.elapsed_seconds = 0;
        self.remaining_seconds = 0;
        self.status = status;
    }

    fn reset_to_default(&mut self, status: DurationStatus) {
        self.running = true;
        self.elapsed_seconds = 0;
        self.remaining_seconds = self.actuator.bounded_default();
        self.status = status;
    }
}
