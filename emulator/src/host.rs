//! Host stand-ins for the board peripherals.
//!
//! Servo moves, indicator changes and telemetry all surface as `tracing`
//! events so a session can be followed from the log alone.

use std::cell::Cell;
use std::time::{Duration, Instant};

use release_core::actuator::{Actuator, ActuatorDriver, HookPosition};
use release_core::feedback::{FULL_BRIGHTNESS, StatusIndicator};
use release_core::service::TickControl;
use release_core::telemetry::{TelemetryEventKind, TelemetryRecorder, TelemetrySink};
use smart_leds::RGB8;
use tracing::{debug, info};

/// Largest catalog the emulator accepts.
pub const EMULATOR_CAPACITY: usize = 16;

const PIN_LABELS: [&str; EMULATOR_CAPACITY] = [
    "SIM0", "SIM1", "SIM2", "SIM3", "SIM4", "SIM5", "SIM6", "SIM7", "SIM8", "SIM9", "SIM10",
    "SIM11", "SIM12", "SIM13", "SIM14", "SIM15",
];

/// Builds `count` simulated actuators sharing the same limits.
pub fn catalog(count: usize, default_seconds: u32, maximum_seconds: u32) -> Vec<Actuator> {
    PIN_LABELS
        .into_iter()
        .take(count)
        .map(|pin| {
            let reference = Actuator::with_defaults(pin);
            Actuator::new(
                pin,
                default_seconds,
                maximum_seconds,
                reference.released_angle,
                reference.armed_angle,
            )
        })
        .collect()
}

/// Servos that only remember their last commanded angle.
#[derive(Debug, Default)]
pub struct SimulatedServos {
    angles: Vec<Option<u8>>,
}

impl SimulatedServos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self, index: usize) -> Option<u8> {
        self.angles.get(index).copied().flatten()
    }

    fn drive(&mut self, index: usize, actuator: &Actuator, position: HookPosition) {
        if self.angles.len() <= index {
            self.angles.resize(index + 1, None);
        }
        let angle = actuator.angle(position);
        self.angles[index] = Some(angle);
        info!(actuator = index, pin = actuator.pin, angle, ?position, "servo moved");
    }
}

impl ActuatorDriver for SimulatedServos {
    fn attach(&mut self, index: usize, actuator: &Actuator) {
        debug!(actuator = index, pin = actuator.pin, "servo attached");
        self.drive(index, actuator, HookPosition::Released);
    }

    fn arm(&mut self, index: usize, actuator: &Actuator) {
        self.drive(index, actuator, HookPosition::Armed);
    }

    fn release(&mut self, index: usize, actuator: &Actuator) {
        self.drive(index, actuator, HookPosition::Released);
    }
}

/// Status LED rendered as log lines.
#[derive(Debug)]
pub struct ConsoleIndicator {
    color: RGB8,
    brightness: u8,
    pulse: Option<Duration>,
}

impl ConsoleIndicator {
    pub fn new() -> Self {
        Self {
            color: RGB8::default(),
            brightness: FULL_BRIGHTNESS,
            pulse: None,
        }
    }

    pub fn color(&self) -> RGB8 {
        self.color
    }

    pub fn pulse_period(&self) -> Option<Duration> {
        self.pulse
    }
}

impl Default for ConsoleIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusIndicator for ConsoleIndicator {
    fn set_color(&mut self, color: RGB8) {
        self.color = color;
        info!(r = color.r, g = color.g, b = color.b, "indicator colour");
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
        debug!(brightness, "indicator brightness");
    }

    fn pulse(&mut self, period: Duration) {
        self.pulse = Some(period);
        info!(period_ms = period.as_millis(), "indicator pulsing");
    }

    fn stop_pulse(&mut self) {
        self.pulse = None;
        info!("indicator steady");
    }
}

/// Tick gate for the single-threaded server loop.
#[derive(Debug, Default)]
pub struct HostTicker {
    paused: Cell<bool>,
    deferred: Cell<u32>,
}

impl HostTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks to run now; zero while paused.
    pub fn claim(&self) -> u32 {
        if self.paused.get() {
            self.deferred.set(self.deferred.get().saturating_add(1));
            0
        } else {
            1 + self.deferred.replace(0)
        }
    }
}

impl TickControl for HostTicker {
    fn pause(&self) {
        self.paused.set(true);
    }

    fn resume(&self) {
        self.paused.set(false);
    }
}

/// Telemetry ring mirrored to `tracing`.
#[derive(Default)]
pub struct TracingTelemetry {
    ring: TelemetryRecorder<Instant>,
}

impl TracingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ring(&self) -> &TelemetryRecorder<Instant> {
        &self.ring
    }
}

impl TelemetrySink<Instant> for TracingTelemetry {
    fn record(&mut self, event: TelemetryEventKind, seconds: u32, timestamp: Instant) {
        let id = self.ring.push(event, seconds, timestamp);
        info!(id, %event, seconds, "telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_applies_limits() {
        let actuators = catalog(3, 30, 90);
        assert_eq!(actuators.len(), 3);
        assert_eq!(actuators[2].pin, "SIM2");
        assert_eq!(actuators[0].default_seconds, 30);
        assert_eq!(actuators[0].maximum_seconds, 90);
        assert_eq!(catalog(40, 1, 1).len(), EMULATOR_CAPACITY);
    }

    #[test]
    fn servos_remember_angles() {
        let actuator = Actuator::with_defaults("SIM1");
        let mut servos = SimulatedServos::new();
        assert_eq!(servos.angle(1), None);
        servos.attach(1, &actuator);
        assert_eq!(servos.angle(1), Some(actuator.released_angle));
        servos.arm(1, &actuator);
        assert_eq!(servos.angle(1), Some(actuator.armed_angle));
        assert_eq!(servos.angle(0), None);
    }

    #[test]
    fn ticker_defers_while_paused() {
        let ticker = HostTicker::new();
        assert_eq!(ticker.claim(), 1);
        ticker.pause();
        assert_eq!(ticker.claim(), 0);
        ticker.resume();
        assert_eq!(ticker.claim(), 2);
    }

    #[test]
    fn indicator_tracks_pulse() {
        let mut indicator = ConsoleIndicator::new();
        indicator.set_color(RGB8 { r: 0, g: 0, b: 255 });
        indicator.pulse(Duration::from_secs(2));
        assert_eq!(indicator.pulse_period(), Some(Duration::from_secs(2)));
        indicator.stop_pulse();
        assert_eq!(indicator.pulse_period(), None);
        assert_eq!(indicator.color(), RGB8 { r: 0, g: 0, b: 255 });
    }
}
