//! Shared doubles for the integration tests.

#![allow(dead_code)]

use core::cell::Cell;
use core::ops::Add;
use core::time::Duration;

use release_core::actuator::{Actuator, ActuatorDriver};
use release_core::feedback::StatusIndicator;
use release_core::protocol::{self, Message};
use release_core::service::{ServiceRegistry, TickControl};
use smart_leds::RGB8;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(u64);

impl MockInstant {
    pub const fn secs(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_millis()).expect("test durations fit in u64"))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServoCall {
    Attach(usize),
    Arm(usize, u8),
    Release(usize, u8),
}

/// Records every servo movement.
#[derive(Default)]
pub struct RecordingDriver {
    pub calls: Vec<ServoCall>,
}

impl RecordingDriver {
    pub fn releases_of(&self, index: usize) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, ServoCall::Release(i, _) if *i == index))
            .count()
    }

    pub fn last_for(&self, index: usize) -> Option<ServoCall> {
        self.calls
            .iter()
            .rev()
            .find(|call| match call {
                ServoCall::Attach(i) | ServoCall::Arm(i, _) | ServoCall::Release(i, _) => {
                    *i == index
                }
            })
            .copied()
    }
}

impl ActuatorDriver for RecordingDriver {
    fn attach(&mut self, index: usize, _: &Actuator) {
        self.calls.push(ServoCall::Attach(index));
    }

    fn arm(&mut self, index: usize, actuator: &Actuator) {
        self.calls.push(ServoCall::Arm(index, actuator.armed_angle));
    }

    fn release(&mut self, index: usize, actuator: &Actuator) {
        self.calls.push(ServoCall::Release(index, actuator.released_angle));
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LedCall {
    Color(RGB8),
    Brightness(u8),
    Pulse(Duration),
    Stop,
}

/// Records every indicator write.
#[derive(Default)]
pub struct RecordingIndicator {
    pub calls: Vec<LedCall>,
}

impl RecordingIndicator {
    pub fn pulses(&self) -> Vec<Duration> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                LedCall::Pulse(period) => Some(*period),
                _ => None,
            })
            .collect()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn set_color(&mut self, color: RGB8) {
        self.calls.push(LedCall::Color(color));
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.calls.push(LedCall::Brightness(brightness));
    }

    fn pulse(&mut self, period: Duration) {
        self.calls.push(LedCall::Pulse(period));
    }

    fn stop_pulse(&mut self) {
        self.calls.push(LedCall::Stop);
    }
}

/// Tick gate that fails the test on nested pauses.
#[derive(Default)]
pub struct StrictTicker {
    paused: Cell<bool>,
    pub pauses: Cell<u32>,
}

impl StrictTicker {
    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }
}

impl TickControl for StrictTicker {
    fn pause(&self) {
        assert!(!self.paused.get(), "tick paused twice");
        self.paused.set(true);
        self.pauses.set(self.pauses.get() + 1);
    }

    fn resume(&self) {
        assert!(self.paused.get(), "tick resumed without pause");
        self.paused.set(false);
    }
}

/// Encodes a request frame.
pub fn request(command: &str, parameters: &[&str]) -> protocol::Frame {
    Message::with_parameters(command, parameters)
        .and_then(|message| message.to_frame())
        .expect("request encodes")
}

/// Sends a request through the registry and returns the reply text.
pub fn call<const N: usize>(
    registry: &mut ServiceRegistry<'_, MockInstant, N>,
    now: MockInstant,
    command: &str,
    parameters: &[&str],
) -> Option<String> {
    let mut out = [0u8; protocol::MAX_FRAME_LEN];
    let written = registry
        .dispatch(&request(command, parameters), now, &mut out)
        .expect("dispatch succeeds");
    if written == 0 {
        return None;
    }
    let reply = protocol::decode(&out[..written]).expect("reply decodes");
    assert!(reply.parameters.is_empty(), "replies carry no parameters");
    assert!(reply.binary.is_empty(), "replies carry no payload");
    Some(reply.command.to_owned())
}
