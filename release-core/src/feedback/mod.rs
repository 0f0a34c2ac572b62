//! Status indicator policy.
//!
//! The indicator shows one aggregate status at a time as a color plus an
//! optional brightness pulse. The pulse hardware restarts its waveform on
//! every period change, so [`FeedbackScheduler`] applies status changes
//! immediately but holds back period-only changes for `min_interval`.

use core::time::Duration;

use smart_leds::RGB8;

use crate::duration::{DurationStatus, ReleaseDuration};
use crate::time::Timestamp;

/// Brightness used for steady output and as the pulse peak.
pub const FULL_BRIGHTNESS: u8 = u8::MAX;

/// Abstraction over the RGB status LED driver.
pub trait StatusIndicator {
    fn set_color(&mut self, color: RGB8);
    fn set_brightness(&mut self, brightness: u8);
    /// Schedules a periodic brightness pulse, replacing any running one.
    fn pulse(&mut self, period: Duration);
    fn stop_pulse(&mut self);
}

/// Indicator driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopStatusIndicator;

impl StatusIndicator for NoopStatusIndicator {
    fn set_color(&mut self, _: RGB8) {}

    fn set_brightness(&mut self, _: u8) {}

    fn pulse(&mut self, _: Duration) {}

    fn stop_pulse(&mut self) {}
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for &mut T {
    fn set_color(&mut self, color: RGB8) {
        (**self).set_color(color);
    }

    fn set_brightness(&mut self, brightness: u8) {
        (**self).set_brightness(brightness);
    }

    fn pulse(&mut self, period: Duration) {
        (**self).pulse(period);
    }

    fn stop_pulse(&mut self) {
        (**self).stop_pulse();
    }
}

/// Pulse shape applied to the indicator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Pulse {
    Steady,
    Every(Duration),
}

/// Color and period table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PulsePolicy {
    /// Period at zero seconds remaining.
    pub fastest: Duration,
    /// Period at `span_seconds` remaining.
    pub slowest: Duration,
    pub span_seconds: u32,
    pub floor: Duration,
    pub ceiling: Duration,
}

impl PulsePolicy {
    pub const fn new() -> Self {
        Self {
            fastest: Duration::from_millis(500),
            slowest: Duration::from_millis(5_000),
            span_seconds: 60 * 60,
            floor: Duration::from_millis(250),
            ceiling: Duration::from_millis(10_000),
        }
    }

    /// Linear interpolation between `fastest` and `slowest`, clamped.
    pub fn countdown_period(&self, remaining_seconds: u32) -> Duration {
        let fastest = duration_millis(self.fastest);
        let slowest = duration_millis(self.slowest);
        let span = u64::from(self.span_seconds.max(1));
        let remaining = u64::from(remaining_seconds);

        let millis = if slowest >= fastest {
            fastest.saturating_add((slowest - fastest).saturating_mul(remaining) / span)
        } else {
            fastest.saturating_sub((fastest - slowest).saturating_mul(remaining) / span)
        };

        Duration::from_millis(millis).clamp(self.floor, self.ceiling)
    }

    /// Pulse shown for `status`; `next_release` only matters for `CountDown`.
    pub fn pulse_for(&self, status: DurationStatus, next_release: u32) -> Pulse {
        match status {
            DurationStatus::Idle => Pulse::Steady,
            DurationStatus::Armed => Pulse::Every(Duration::from_millis(1_000)),
            DurationStatus::Holding => Pulse::Every(Duration::from_millis(2_000)),
            DurationStatus::AwaitRelease => Pulse::Every(Duration::from_millis(3_000)),
            DurationStatus::CountDown => Pulse::Every(self.countdown_period(next_release)),
            DurationStatus::Released => Pulse::Every(Duration::from_millis(750)),
            DurationStatus::Error => Pulse::Every(self.floor),
        }
    }
}

impl Default for PulsePolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Indicator color for `status`.
pub const fn status_color(status: DurationStatus) -> RGB8 {
    match status {
        DurationStatus::Idle => RGB8::new(255, 255, 255),
        DurationStatus::Armed => RGB8::new(255, 160, 0),
        DurationStatus::Holding => RGB8::new(0, 0, 255),
        DurationStatus::CountDown => RGB8::new(0, 160, 255),
        DurationStatus::AwaitRelease => RGB8::new(160, 0, 255),
        DurationStatus::Released => RGB8::new(0, 255, 0),
        DurationStatus::Error => RGB8::new(255, 0, 0),
    }
}

/// Dominant status across timers plus the furthest pending release.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Aggregate {
    pub status: DurationStatus,
    pub next_release: u32,
}

/// Folds every running timer into the status the indicator should show.
pub fn aggregate<'a, 'b: 'a, D>(durations: D) -> Aggregate
where
    D: IntoIterator<Item = &'a ReleaseDuration<'b>>,
{
    durations
        .into_iter()
        .filter(|duration| duration.running())
        .fold(
            Aggregate {
                status: DurationStatus::Idle,
                next_release: 0,
            },
            |acc, duration| Aggregate {
                status: if duration.status().rank() > acc.status.rank() {
                    duration.status()
                } else {
                    acc.status
                },
                next_release: acc.next_release.max(duration.remaining_seconds()),
            },
        )
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Applied<I> {
    status: DurationStatus,
    pulse: Pulse,
    at: I,
}

/// Rate-limited driver for a [`StatusIndicator`].
pub struct FeedbackScheduler<I, L> {
    indicator: L,
    policy: PulsePolicy,
    min_interval: Duration,
    applied: Option<Applied<I>>,
}

impl<I, L> FeedbackScheduler<I, L>
where
    I: Timestamp,
    L: StatusIndicator,
{
    pub const fn new(indicator: L, policy: PulsePolicy, min_interval: Duration) -> Self {
        Self {
            indicator,
            policy,
            min_interval,
            applied: None,
        }
    }

    /// Shows `status`; returns whether the indicator was touched.
    pub fn update(&mut self, status: DurationStatus, next_release: u32, now: I) -> bool {
        let pulse = self.policy.pulse_for(status, next_release);

        if let Some(applied) = self.applied {
            if applied.status == status
                && (applied.pulse == pulse || now < applied.at + self.min_interval)
            {
                return false;
            }
        }

        if self.applied.is_none_or(|applied| applied.status != status) {
            self.indicator.set_color(status_color(status));
        }
        self.indicator.set_brightness(FULL_BRIGHTNESS);
        match pulse {
            Pulse::Steady => self.indicator.stop_pulse(),
            Pulse::Every(period) => self.indicator.pulse(period),
        }

        self.applied = Some(Applied {
            status,
            pulse,
            at: now,
        });
        true
    }

    /// Forgets the applied state so the next update is written through.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }

    /// Status currently shown, if any.
    pub fn shown(&self) -> Option<DurationStatus> {
        self.applied.map(|applied| applied.status)
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }
}
