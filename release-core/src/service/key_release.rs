//! The key release service.
//!
//! Owns one [`ReleaseDuration`] per configured [`Actuator`] and is the only
//! code that moves servos. Every write command runs with the tick paused.
//! An illegal `hold`/`start` is a safety fault: every hook opens, every timer
//! is cleared and the indicator latches `Error` until the next `arm`.

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::actuator::{Actuator, ActuatorDriver, MAX_ACTUATORS};
use crate::config::ServiceConfig;
use crate::duration::{Advance, DurationStatus, ReleaseDuration};
use crate::feedback::{self, FeedbackScheduler, StatusIndicator};
use crate::protocol::Message;
use crate::session::SessionKey;
use crate::sleep::{self, SleepGrant, SleepMode};
use crate::telemetry::{ReleaseCause, TelemetryEventKind, TelemetrySink};
use crate::time::Timestamp;

use super::commands::{self, CommandError, KeyCommand};
use super::{Reply, Service, TickControl};

/// Construction failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceError {
    NoActuators,
    TooManyActuators { configured: usize, capacity: usize },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NoActuators => f.write_str("no actuators configured"),
            ServiceError::TooManyActuators {
                configured,
                capacity,
            } => write!(f, "{configured} actuators configured, capacity is {capacity}"),
        }
    }
}

/// Collaborators injected into [`KeyReleaseService`].
pub struct ServiceComponents<D, L, T, S> {
    pub driver: D,
    pub indicator: L,
    pub ticker: T,
    pub telemetry: S,
}

impl<D, L, T, S> ServiceComponents<D, L, T, S> {
    pub const fn new(driver: D, indicator: L, ticker: T, telemetry: S) -> Self {
        Self {
            driver,
            indicator,
            ticker,
            telemetry,
        }
    }
}

/// Timed key release over a fixed set of actuators.
pub struct KeyReleaseService<'a, I, D, L, T, S, const N: usize = MAX_ACTUATORS>
where
    I: Timestamp,
{
    config: ServiceConfig<'a>,
    slots: Vec<ReleaseDuration<'a>, N>,
    driver: D,
    feedback: FeedbackScheduler<I, L>,
    ticker: T,
    telemetry: S,
    session_key: SessionKey,
    fault_latched: bool,
    show_released: bool,
}

impl<'a, I, D, L, T, S, const N: usize> KeyReleaseService<'a, I, D, L, T, S, N>
where
    I: Timestamp,
    D: ActuatorDriver,
    L: StatusIndicator,
    T: TickControl,
    S: TelemetrySink<I>,
{
    /// Builds the service and runs the boot sequence: every servo is attached
    /// and opened, every timer starts `Idle`.
    pub fn new(
        config: ServiceConfig<'a>,
        actuators: &'a [Actuator],
        components: ServiceComponents<D, L, T, S>,
        session_key: SessionKey,
        now: I,
    ) -> Result<Self, ServiceError> {
        if actuators.is_empty() {
            return Err(ServiceError::NoActuators);
        }

        let mut slots = Vec::new();
        for actuator in actuators {
            slots
                .push(ReleaseDuration::new(actuator))
                .map_err(|_| ServiceError::TooManyActuators {
                    configured: actuators.len(),
                    capacity: N,
                })?;
        }

        let ServiceComponents {
            mut driver,
            indicator,
            ticker,
            telemetry,
        } = components;
        for (index, actuator) in actuators.iter().enumerate() {
            driver.attach(index, actuator);
        }

        let mut service = Self {
            feedback: FeedbackScheduler::new(
                indicator,
                config.pulse_policy,
                config.max_pulse_frequency,
            ),
            config,
            slots,
            driver,
            ticker,
            telemetry,
            session_key,
            fault_latched: false,
            show_released: false,
        };
        service.boot(now);
        Ok(service)
    }

    pub fn config(&self) -> &ServiceConfig<'a> {
        &self.config
    }

    pub fn session_key(&self) -> SessionKey {
        self.session_key
    }

    pub fn durations(&self) -> &[ReleaseDuration<'a>] {
        &self.slots
    }

    pub fn duration(&self, index: usize) -> Option<&ReleaseDuration<'a>> {
        self.slots.get(index)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn indicator(&self) -> &L {
        self.feedback.indicator()
    }

    pub fn telemetry(&self) -> &S {
        &self.telemetry
    }

    /// Status the indicator currently shows.
    pub fn feedback_status(&self) -> Option<DurationStatus> {
        self.feedback.shown()
    }

    /// Whether any timer is counting.
    pub fn any_running(&self) -> bool {
        self.slots.iter().any(ReleaseDuration::running)
    }

    /// Parses and executes one command of this namespace.
    pub fn execute(&mut self, command: &str, parameters: &[&str], now: I) -> Option<Reply> {
        let command = match commands::parse(command, parameters) {
            Ok(command) => command,
            Err(CommandError::Unknown) => return None,
            Err(CommandError::MissingParameter(_) | CommandError::InvalidParameter(_)) => {
                return Some(Reply::WrongParameter);
            }
        };

        if command.is_write() {
            self.ticker.pause();
            let reply = self.apply(command, now);
            self.ticker.resume();
            Some(reply)
        } else {
            Some(self.apply(command, now))
        }
    }

    /// Advances every running timer by one second.
    pub fn advance(&mut self, now: I) {
        let mut released = false;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.advance() == Advance::Expired {
                self.driver.release(index, slot.actuator());
                self.telemetry.record(
                    TelemetryEventKind::Released(event_index(index), ReleaseCause::Expired),
                    0,
                    now,
                );
                released = true;
            }
        }
        self.show_released = released;
        self.refresh(now);
    }

    /// Narrows a sleep request to what the running timers allow.
    pub fn negotiate_sleep(&mut self, requested: Duration, mode: SleepMode, now: I) -> SleepGrant {
        let grant = sleep::negotiate(
            self.slots
                .iter()
                .filter(|slot| slot.running())
                .map(ReleaseDuration::remaining_seconds),
            requested,
            mode,
        );
        let granted_seconds = u32::try_from(grant.duration.as_secs()).unwrap_or(u32::MAX);
        self.telemetry.record(
            TelemetryEventKind::SleepGranted(grant.mode),
            granted_seconds,
            now,
        );
        grant
    }

    /// Opens every hook and clears every timer, as after a power cycle.
    pub fn boot(&mut self, now: I) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.running() {
                self.telemetry.record(
                    TelemetryEventKind::Released(event_index(index), ReleaseCause::Boot),
                    0,
                    now,
                );
            }
            self.driver.release(index, slot.actuator());
            slot.clear(DurationStatus::Idle);
        }
        self.fault_latched = false;
        self.show_released = false;
        self.telemetry.record(TelemetryEventKind::Booted, 0, now);
        self.feedback.invalidate();
        self.refresh(now);
    }

    fn apply(&mut self, command: KeyCommand<'_>, now: I) -> Reply {
        if command.index().is_some_and(|index| index >= self.slots.len()) {
            return Reply::WrongParameter;
        }

        match command {
            KeyCommand::Actuators => {
                let count = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                Reply::Number(count.min(self.config.display_limit))
            }
            KeyCommand::Arm(index) => self.arm(index, now),
            KeyCommand::Hold(index) => self.hold(index, now),
            KeyCommand::Start(index, seconds) => self.start(index, seconds, now),
            KeyCommand::Add(index, seconds) => self.add(index, seconds, now),
            KeyCommand::Available(index) => Reply::Number(self.slots[index].available_seconds()),
            KeyCommand::Remaining(index) => Reply::Number(self.slots[index].remaining_seconds()),
            KeyCommand::Running(index) => Reply::Flag(self.slots[index].running()),
            KeyCommand::Status(index) => Reply::Text(self.slots[index].status().name()),
            KeyCommand::Release(index, key) => self.release(index, key, now),
        }
    }

    fn arm(&mut self, index: usize, now: I) -> Reply {
        let slot = &mut self.slots[index];
        self.driver.release(index, slot.actuator());
        slot.arm();
        self.telemetry.record(
            TelemetryEventKind::Armed(event_index(index)),
            slot.remaining_seconds(),
            now,
        );
        self.fault_latched = false;
        self.refresh(now);
        Reply::Ok
    }

    fn hold(&mut self, index: usize, now: I) -> Reply {
        if !self.slots[index].status().accepts_hold() {
            return self.fault(now);
        }

        let slot = &mut self.slots[index];
        slot.hold();
        self.driver.arm(index, slot.actuator());
        self.telemetry.record(
            TelemetryEventKind::Holding(event_index(index)),
            slot.remaining_seconds(),
            now,
        );
        self.refresh(now);
        Reply::SessionKey(self.session_key)
    }

    fn start(&mut self, index: usize, seconds: u32, now: I) -> Reply {
        if !self.slots[index].status().accepts_hold() {
            return self.fault(now);
        }

        let slot = &mut self.slots[index];
        let event = if seconds == 0 {
            slot.await_release();
            TelemetryEventKind::AwaitingRelease(event_index(index))
        } else {
            slot.start(seconds);
            TelemetryEventKind::CountDownStarted(event_index(index))
        };
        self.driver.arm(index, slot.actuator());
        self.telemetry.record(event, slot.remaining_seconds(), now);
        self.refresh(now);
        Reply::SessionKey(self.session_key)
    }

    fn add(&mut self, index: usize, seconds: u32, now: I) -> Reply {
        let slot = &mut self.slots[index];
        let remaining = slot.add(seconds);
        if slot.running() {
            self.telemetry.record(
                TelemetryEventKind::Extended(event_index(index)),
                remaining,
                now,
            );
            self.refresh(now);
        }
        Reply::Number(remaining)
    }

    fn release(&mut self, index: usize, key: Option<&str>, now: I) -> Reply {
        if key.is_some_and(|key| !self.session_key.matches(key)) {
            self.telemetry.record(
                TelemetryEventKind::ReleaseKeyMismatch(event_index(index)),
                0,
                now,
            );
        }

        let slot = &mut self.slots[index];
        slot.clear(DurationStatus::Released);
        self.driver.release(index, slot.actuator());
        self.telemetry.record(
            TelemetryEventKind::Released(event_index(index), ReleaseCause::Command),
            0,
            now,
        );
        self.show_released = true;
        self.refresh(now);
        Reply::Ok
    }

    fn fault(&mut self, now: I) -> Reply {
        self.telemetry
            .record(TelemetryEventKind::SafetyFault, 0, now);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.running() {
                self.telemetry.record(
                    TelemetryEventKind::Released(event_index(index), ReleaseCause::Fault),
                    0,
                    now,
                );
            }
            slot.clear(DurationStatus::Idle);
            self.driver.release(index, slot.actuator());
        }
        self.fault_latched = true;
        self.show_released = false;
        self.refresh(now);
        Reply::WrongCall
    }

    fn refresh(&mut self, now: I) {
        let summary = feedback::aggregate(self.slots.iter());
        let status = if self.fault_latched {
            DurationStatus::Error
        } else if self.show_released {
            DurationStatus::Released
        } else {
            summary.status
        };
        self.feedback.update(status, summary.next_release, now);
    }
}

impl<I, D, L, T, S, const N: usize> Service<I> for KeyReleaseService<'_, I, D, L, T, S, N>
where
    I: Timestamp,
    D: ActuatorDriver,
    L: StatusIndicator,
    T: TickControl,
    S: TelemetrySink<I>,
{
    fn name(&self) -> &str {
        self.config.name
    }

    fn handle(&mut self, command: &str, message: &Message<'_>, now: I) -> Option<Reply> {
        self.execute(command, &message.parameters, now)
    }

    fn tick(&mut self, now: I) {
        self.advance(now);
    }

    fn sleep_requested(&mut self, requested: Duration, mode: SleepMode, now: I) -> SleepGrant {
        self.negotiate_sleep(requested, mode, now)
    }

    fn reboot(&mut self, now: I) {
        self.boot(now);
    }
}

fn event_index(index: usize) -> u8 {
    u8::try_from(index).unwrap_or(u8::MAX)
}
