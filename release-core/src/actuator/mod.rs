//! Release point metadata and the servo driver seam.
//!
//! Each [`Actuator`] describes one physical hook: where it is wired, how long
//! it may hold a key, and the two servo angles it moves between. Descriptions
//! are immutable for the life of the process; the mutable timer that tracks a
//! hook lives in [`crate::duration`].

/// Most release points a single controller drives.
pub const MAX_ACTUATORS: usize = 4;

/// One hour, the default timer applied by `arm`/`hold`.
pub const DEFAULT_HOLD_SECONDS: u32 = 60 * 60;

/// Two hours, the hard ceiling for any timer.
pub const DEFAULT_MAXIMUM_SECONDS: u32 = 2 * 60 * 60;

/// Servo angle that lets the key drop.
pub const DEFAULT_RELEASED_ANGLE: u8 = 0;

/// Servo angle that closes the hook around the key.
pub const DEFAULT_ARMED_ANGLE: u8 = 90;

/// Static description of a release point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Actuator {
    pub pin: &'static str,
    pub default_seconds: u32,
    pub maximum_seconds: u32,
    pub released_angle: u8,
    pub armed_angle: u8,
}

impl Actuator {
    pub const fn new(
        pin: &'static str,
        default_seconds: u32,
        maximum_seconds: u32,
        released_angle: u8,
        armed_angle: u8,
    ) -> Self {
        Self {
            pin,
            default_seconds,
            maximum_seconds,
            released_angle,
            armed_angle,
        }
    }

    /// Release point using the board defaults on `pin`.
    pub const fn with_defaults(pin: &'static str) -> Self {
        Self::new(
            pin,
            DEFAULT_HOLD_SECONDS,
            DEFAULT_MAXIMUM_SECONDS,
            DEFAULT_RELEASED_ANGLE,
            DEFAULT_ARMED_ANGLE,
        )
    }

    /// Returns the default timer clamped to the ceiling.
    pub const fn bounded_default(&self) -> u32 {
        if self.default_seconds > self.maximum_seconds {
            self.maximum_seconds
        } else {
            self.default_seconds
        }
    }

    /// Servo angle for the requested hook position.
    pub const fn angle(&self, position: HookPosition) -> u8 {
        match position {
            HookPosition::Released => self.released_angle,
            HookPosition::Armed => self.armed_angle,
        }
    }
}

/// Compile-time catalog of the board's release points (TIM2 CH1/CH2).
pub const DEFAULT_ACTUATORS: [Actuator; 2] = [
    Actuator::with_defaults("PA0"),
    Actuator::with_defaults("PA1"),
];

/// Physical hook position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HookPosition {
    Released,
    Armed,
}

/// Abstraction over the physical servo drivers.
pub trait ActuatorDriver {
    /// Prepares the output for `actuator` at `index`.
    fn attach(&mut self, index: usize, actuator: &Actuator);

    /// Closes the hook (moves to `armed_angle`).
    fn arm(&mut self, index: usize, actuator: &Actuator);

    /// Opens the hook (moves to `released_angle`).
    fn release(&mut self, index: usize, actuator: &Actuator);
}

/// Actuator driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopActuatorDriver;

impl NoopActuatorDriver {
    /// Creates a new no-op actuator driver.
    pub const fn new() -> Self {
        Self
    }
}

impl ActuatorDriver for NoopActuatorDriver {
    fn attach(&mut self, _: usize, _: &Actuator) {}

    fn arm(&mut self, _: usize, _: &Actuator) {}

    fn release(&mut self, _: usize, _: &Actuator) {}
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for &mut T {
    fn attach(&mut self, index: usize, actuator: &Actuator) {
        (**self).attach(index, actuator);
    }

    fn arm(&mut self, index: usize, actuator: &Actuator) {
        (**self).arm(index, actuator);
    }

    fn release(&mut self, index: usize, actuator: &Actuator) {
        (**self).release(index, actuator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_uses_board_defaults() {
        let first = DEFAULT_ACTUATORS[0];
        assert_eq!(first.pin, "PA0");
        assert_eq!(first.default_seconds, 3_600);
        assert_eq!(first.maximum_seconds, 7_200);
        assert_eq!(first.angle(HookPosition::Released), 0);
        assert_eq!(first.angle(HookPosition::Armed), 90);
        assert!(DEFAULT_ACTUATORS.len() <= MAX_ACTUATORS);
    }

    #[test]
    fn bounded_default_never_exceeds_ceiling() {
        let actuator = Actuator::new("PA10", 900, 600, 10, 80);
        assert_eq!(actuator.bounded_default(), 600);
    }
}
