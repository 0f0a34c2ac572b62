//! Telemetry sink for the firmware.
//!
//! Keeps the most recent release events in a ring and mirrors each one to
//! defmt (target) or stdout (host) as it is recorded.

use release_core::telemetry::{TelemetryEventKind, TelemetryRecorder, TelemetrySink};

use crate::clock::FirmwareInstant;

/// Records retained in memory.
pub const FIRMWARE_TELEMETRY_CAPACITY: usize = 32;

pub struct LoggedTelemetry {
    ring: TelemetryRecorder<FirmwareInstant, FIRMWARE_TELEMETRY_CAPACITY>,
}

impl LoggedTelemetry {
    pub const fn new() -> Self {
        Self {
            ring: TelemetryRecorder::new(),
        }
    }

    pub fn ring(&self) -> &TelemetryRecorder<FirmwareInstant, FIRMWARE_TELEMETRY_CAPACITY> {
        &self.ring
    }
}

impl Default for LoggedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink<FirmwareInstant> for LoggedTelemetry {
    fn record(&mut self, event: TelemetryEventKind, seconds: u32, timestamp: FirmwareInstant) {
        let id = self.ring.push(event, seconds, timestamp);
        emit_log(id, event, seconds, timestamp.as_micros());
    }
}

#[cfg(target_os = "none")]
fn emit_log(id: u32, event: TelemetryEventKind, seconds: u32, timestamp_us: u64) {
    defmt::info!(
        "telemetry:{} {} s={} t={}us",
        id,
        event,
        seconds,
        timestamp_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_log(id: u32, event: TelemetryEventKind, seconds: u32, timestamp_us: u64) {
    println!("telemetry:{id} {event} s={seconds} t={timestamp_us}us");
}
