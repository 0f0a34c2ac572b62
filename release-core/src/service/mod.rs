//! Service registry and reply encoding.
//!
//! The transport hands every received frame to [`ServiceRegistry::dispatch`].
//! The registry decodes it, routes it by the service prefix of its command
//! (`"<service> <command>"`) and encodes the service's [`Reply`] into the
//! caller's buffer. A frame nobody claims yields a zero-length reply.

use core::fmt::{self, Write as _};
use core::time::Duration;

use heapless::{String, Vec};

use crate::protocol::{self, DecodeError, EncodeError, Message};
use crate::session::SessionKey;
use crate::sleep::{SleepGrant, SleepMode};
use crate::time::Timestamp;

pub mod commands;
pub mod key_release;

pub use key_release::{KeyReleaseService, ServiceComponents, ServiceError};

/// Longest reply text, sized for `WrongParameter` and `u32::MAX`.
pub const REPLY_TEXT_LEN: usize = 16;

/// Services the registry can hold by default.
pub const DEFAULT_SERVICE_CAPACITY: usize = 4;

/// Answer produced by a service.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    Ok,
    WrongCall,
    WrongParameter,
    SessionKey(SessionKey),
    Number(u32),
    Flag(bool),
    Text(&'static str),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => f.write_str("Ok"),
            Reply::WrongCall => f.write_str("WrongCall"),
            Reply::WrongParameter => f.write_str("WrongParameter"),
            Reply::SessionKey(key) => write!(f, "{key}"),
            Reply::Number(value) => write!(f, "{value}"),
            Reply::Flag(true) => f.write_str("1"),
            Reply::Flag(false) => f.write_str("0"),
            Reply::Text(text) => f.write_str(text),
        }
    }
}

impl Reply {
    /// Encodes the reply as a frame with no parameters and no payload.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, EncodeError> {
        let mut text: String<REPLY_TEXT_LEN> = String::new();
        write!(text, "{self}").map_err(|_| EncodeError::TextTooLong)?;
        Message::new(&text).encode(out)
    }
}

/// Gate that keeps the periodic tick away from state transitions.
///
/// Write commands run between [`TickControl::pause`] and
/// [`TickControl::resume`]; a tick that comes due while paused is deferred
/// until resume.
pub trait TickControl {
    fn pause(&self);
    fn resume(&self);
}

impl<T: TickControl + ?Sized> TickControl for &T {
    fn pause(&self) {
        (**self).pause();
    }

    fn resume(&self) {
        (**self).resume();
    }
}

/// Tick control for callers that already serialize ticks and commands.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopTickControl;

impl TickControl for NoopTickControl {
    fn pause(&self) {}

    fn resume(&self) {}
}

/// A named command namespace.
pub trait Service<I: Timestamp> {
    /// Prefix matched against the first word of incoming commands.
    fn name(&self) -> &str;

    /// Handles `command` (the routed remainder). `None` means unhandled.
    fn handle(&mut self, command: &str, message: &Message<'_>, now: I) -> Option<Reply>;

    /// Periodic tick.
    fn tick(&mut self, _now: I) {}

    /// Restricts a requested sleep window to what the service can tolerate.
    fn sleep_requested(&mut self, requested: Duration, mode: SleepMode, _now: I) -> SleepGrant {
        SleepGrant::new(requested, mode)
    }

    /// Called after the device woke from deep sleep.
    fn reboot(&mut self, _now: I) {}
}

/// Failures surfaced to the transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    Decode(DecodeError),
    Encode(EncodeError),
}

impl From<DecodeError> for DispatchError {
    fn from(error: DecodeError) -> Self {
        Self::Decode(error)
    }
}

impl From<EncodeError> for DispatchError {
    fn from(error: EncodeError) -> Self {
        Self::Encode(error)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Decode(error) => write!(f, "decode failed: {error}"),
            DispatchError::Encode(error) => write!(f, "reply encoding failed: {error}"),
        }
    }
}

/// Registration failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    Full,
    DuplicateName,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Full => f.write_str("service registry is full"),
            RegistryError::DuplicateName => f.write_str("service name already registered"),
        }
    }
}

/// Explicit collection of the services reachable over the transport.
pub struct ServiceRegistry<'a, I, const N: usize = DEFAULT_SERVICE_CAPACITY> {
    services: Vec<&'a mut dyn Service<I>, N>,
}

impl<'a, I, const N: usize> ServiceRegistry<'a, I, N>
where
    I: Timestamp,
{
    pub const fn new() -> Self {
        Self {
            services: Vec::new(),
        }
    }

    /// Adds `service`; names must be unique.
    pub fn register(&mut self, service: &'a mut dyn Service<I>) -> Result<(), RegistryError> {
        if self
            .services
            .iter()
            .any(|existing| existing.name() == service.name())
        {
            return Err(RegistryError::DuplicateName);
        }
        self.services
            .push(service)
            .map_err(|_| RegistryError::Full)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Decodes `frame`, routes it and writes the reply frame into `out`.
    ///
    /// Returns the reply length; zero means no service claimed the frame.
    pub fn dispatch(&mut self, frame: &[u8], now: I, out: &mut [u8]) -> Result<usize, DispatchError> {
        let message = protocol::decode(frame)?;
        let route = message.route();

        let Some(service) = self
            .services
            .iter_mut()
            .find(|service| service.name() == route.service)
        else {
            return Ok(0);
        };

        match service.handle(route.command, &message, now) {
            Some(reply) => Ok(reply.encode(out)?),
            None => Ok(0),
        }
    }

    /// Ticks every service.
    pub fn tick(&mut self, now: I) {
        for service in &mut self.services {
            service.tick(now);
        }
    }

    /// Narrows `requested` through every service.
    pub fn sleep_requested(&mut self, requested: Duration, mode: SleepMode, now: I) -> SleepGrant {
        self.services
            .iter_mut()
            .fold(SleepGrant::new(requested, mode), |grant, service| {
                grant.restrict(service.sleep_requested(requested, mode, now))
            })
    }

    /// Restarts every service after deep sleep.
    pub fn reboot(&mut self, now: I) {
        for service in &mut self.services {
            service.reboot(now);
        }
    }
}

impl<I, const N: usize> Default for ServiceRegistry<'_, I, N>
where
    I: Timestamp,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;
    use crate::time::mock::MockInstant;

    struct Echo {
        name: &'static str,
        ticks: u32,
        grant: Option<SleepGrant>,
    }

    impl Echo {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                ticks: 0,
                grant: None,
            }
        }
    }

    impl Service<MockInstant> for Echo {
        fn name(&self) -> &str {
            self.name
        }

        fn handle(&mut self, command: &str, message: &Message<'_>, _: MockInstant) -> Option<Reply> {
            match command {
                "ping" => Some(Reply::Ok),
                "count" => Some(Reply::Number(u32::try_from(message.parameters.len()).ok()?)),
                _ => None,
            }
        }

        fn tick(&mut self, _: MockInstant) {
            self.ticks += 1;
        }

        fn sleep_requested(
            &mut self,
            requested: Duration,
            mode: SleepMode,
            _: MockInstant,
        ) -> SleepGrant {
            self.grant.unwrap_or(SleepGrant::new(requested, mode))
        }
    }

    fn frame(command: &str, parameters: &[&str]) -> protocol::Frame {
        Message::with_parameters(command, parameters)
            .and_then(|message| message.to_frame())
            .expect("request encodes")
    }

    #[test]
    fn routes_by_service_prefix() {
        let mut echo = Echo::new("echo");
        let mut registry: ServiceRegistry<'_, MockInstant> = ServiceRegistry::new();
        registry.register(&mut echo).expect("registers");

        let mut out = [0u8; 64];
        let written = registry
            .dispatch(&frame("echo count", &["a", "b"]), MockInstant(0), &mut out)
            .expect("dispatches");
        let reply = decode(&out[..written]).expect("reply decodes");
        assert_eq!(reply.command, "2");
        assert!(reply.parameters.is_empty());
        assert!(reply.binary.is_empty());
    }

    #[test]
    fn unclaimed_frames_get_empty_reply() {
        let mut echo = Echo::new("echo");
        let mut registry: ServiceRegistry<'_, MockInstant> = ServiceRegistry::new();
        registry.register(&mut echo).expect("registers");

        let mut out = [0u8; 64];
        for command in ["other ping", "echo", "echo missing", "ping"] {
            assert_eq!(
                registry.dispatch(&frame(command, &[]), MockInstant(0), &mut out),
                Ok(0)
            );
        }
    }

    #[test]
    fn malformed_frames_are_errors() {
        let mut registry: ServiceRegistry<'_, MockInstant> = ServiceRegistry::new();
        let mut out = [0u8; 64];
        assert!(matches!(
            registry.dispatch(&[0x00], MockInstant(0), &mut out),
            Err(DispatchError::Decode(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut first = Echo::new("echo");
        let mut second = Echo::new("echo");
        let mut registry: ServiceRegistry<'_, MockInstant, 1> = ServiceRegistry::new();
        registry.register(&mut first).expect("registers");
        assert_eq!(
            registry.register(&mut second),
            Err(RegistryError::DuplicateName)
        );
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let mut first = Echo::new("a");
        let mut second = Echo::new("b");
        let mut registry: ServiceRegistry<'_, MockInstant, 1> = ServiceRegistry::new();
        registry.register(&mut first).expect("registers");
        assert_eq!(registry.register(&mut second), Err(RegistryError::Full));
    }

    #[test]
    fn tick_and_sleep_fan_out() {
        let mut first = Echo::new("a");
        let mut second = Echo::new("b");
        second.grant = Some(SleepGrant::new(
            Duration::from_secs(30),
            SleepMode::LightSleep,
        ));
        {
            let mut registry: ServiceRegistry<'_, MockInstant> = ServiceRegistry::new();
            registry.register(&mut first).expect("registers");
            registry.register(&mut second).expect("registers");
            registry.tick(MockInstant(0));

            let grant = registry.sleep_requested(
                Duration::from_secs(60),
                SleepMode::DeepSleep,
                MockInstant(0),
            );
            assert_eq!(
                grant,
                SleepGrant::new(Duration::from_secs(30), SleepMode::LightSleep)
            );
        }
        assert_eq!(first.ticks, 1);
        assert_eq!(second.ticks, 1);
    }

    #[test]
    fn reply_texts() {
        let mut out = [0u8; 32];
        let cases = [
            (Reply::Ok, "Ok"),
            (Reply::WrongCall, "WrongCall"),
            (Reply::WrongParameter, "WrongParameter"),
            (Reply::Number(u32::MAX), "4294967295"),
            (Reply::Flag(true), "1"),
            (Reply::Flag(false), "0"),
            (Reply::Text("AwaitRelease"), "AwaitRelease"),
        ];
        for (reply, text) in cases {
            let written = reply.encode(&mut out).expect("reply fits");
            assert_eq!(decode(&out[..written]).map(|m| m.command), Ok(text));
        }
    }
}
