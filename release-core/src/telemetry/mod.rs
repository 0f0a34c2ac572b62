//! Telemetry event catalog and the bounded in-memory event log.
//!
//! The core never logs directly. Services report what happened to a
//! [`TelemetrySink`]; the firmware mirrors records to defmt, the emulator to
//! `tracing`, and tests inspect a [`TelemetryRecorder`].

use core::fmt;

use heapless::HistoryBuf;

use crate::sleep::SleepMode;

/// Monotonic identifier assigned to each telemetry record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Why a hook was opened.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReleaseCause {
    Expired,
    Command,
    Fault,
    Boot,
}

impl fmt::Display for ReleaseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReleaseCause::Expired => "expired",
            ReleaseCause::Command => "command",
            ReleaseCause::Fault => "fault",
            ReleaseCause::Boot => "boot",
        })
    }
}

/// Discriminated telemetry events. Actuator indices are zero based.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    Booted,
    Armed(u8),
    Holding(u8),
    CountDownStarted(u8),
    AwaitingRelease(u8),
    Extended(u8),
    Released(u8, ReleaseCause),
    SafetyFault,
    SleepGranted(SleepMode),
    ReleaseKeyMismatch(u8),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Booted => f.write_str("booted"),
            TelemetryEventKind::Armed(index) => write!(f, "armed #{index}"),
            TelemetryEventKind::Holding(index) => write!(f, "holding #{index}"),
            TelemetryEventKind::CountDownStarted(index) => write!(f, "countdown #{index}"),
            TelemetryEventKind::AwaitingRelease(index) => write!(f, "await-release #{index}"),
            TelemetryEventKind::Extended(index) => write!(f, "extended #{index}"),
            TelemetryEventKind::Released(index, cause) => {
                write!(f, "released #{index} ({cause})")
            }
            TelemetryEventKind::SafetyFault => f.write_str("safety-fault"),
            TelemetryEventKind::SleepGranted(mode) => write!(f, "sleep-granted {mode}"),
            TelemetryEventKind::ReleaseKeyMismatch(index) => {
                write!(f, "release-key-mismatch #{index}")
            }
        }
    }
}

/// Telemetry record stored in the ring buffer.
///
/// `seconds` carries the number that goes with the event: the timer length
/// for arm/hold/start, the new remaining time for extensions and the granted
/// window for sleep. It is zero otherwise.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub seconds: u32,
}

/// Receiver for service telemetry.
pub trait TelemetrySink<TInstant: Copy> {
    fn record(&mut self, event: TelemetryEventKind, seconds: u32, timestamp: TInstant);
}

impl<TInstant: Copy, T: TelemetrySink<TInstant> + ?Sized> TelemetrySink<TInstant> for &mut T {
    fn record(&mut self, event: TelemetryEventKind, seconds: u32, timestamp: TInstant) {
        (**self).record(event, seconds, timestamp);
    }
}

/// Sink that discards every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTelemetry;

impl<TInstant: Copy> TelemetrySink<TInstant> for NoopTelemetry {
    fn record(&mut self, _: TelemetryEventKind, _: u32, _: TInstant) {}
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Counts retained records matching `predicate`.
    pub fn count<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&TelemetryEventKind) -> bool,
    {
        self.oldest_first()
            .filter(|record| predicate(&record.event))
            .count()
    }

    /// Appends an event and returns its identifier.
    pub fn push(&mut self, event: TelemetryEventKind, seconds: u32, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            seconds,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> TelemetrySink<TInstant>
    for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn record(&mut self, event: TelemetryEventKind, seconds: u32, timestamp: TInstant) {
        self.push(event, seconds, timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::mock::MockInstant;

    #[test]
    fn recorder_keeps_latest_entries() {
        let mut recorder: TelemetryRecorder<MockInstant, 4> = TelemetryRecorder::new();
        for second in 0..6u32 {
            recorder.record(
                TelemetryEventKind::Extended(0),
                second,
                MockInstant::secs(u64::from(second)),
            );
        }

        assert_eq!(recorder.len(), 4);
        let seconds: heapless::Vec<u32, 4> =
            recorder.oldest_first().map(|record| record.seconds).collect();
        assert_eq!(seconds.as_slice(), &[2, 3, 4, 5]);
        assert_eq!(recorder.latest().map(|record| record.id), Some(5));
    }

    #[test]
    fn count_filters_by_event() {
        let mut recorder: TelemetryRecorder<MockInstant, 8> = TelemetryRecorder::new();
        recorder.record(TelemetryEventKind::Booted, 0, MockInstant(0));
        recorder.record(
            TelemetryEventKind::Released(0, ReleaseCause::Expired),
            0,
            MockInstant(1),
        );
        assert_eq!(
            recorder.count(|event| matches!(event, TelemetryEventKind::Released(..))),
            1
        );
    }
}
