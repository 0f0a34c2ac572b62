//! Tunables for the key release service.

use core::time::Duration;

use crate::feedback::PulsePolicy;

/// Namespace the key release service answers to.
pub const DEFAULT_SERVICE_NAME: &str = "keys";

/// Nominal tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Minimum spacing between pulse period changes on the indicator.
pub const MAX_PULSE_FREQUENCY: Duration = Duration::from_secs(10);

/// Largest actuator count reported by the `actuators` command.
pub const DISPLAY_LIMIT: u32 = 9;

/// Runtime configuration for the key release service.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ServiceConfig<'a> {
    pub name: &'a str,
    pub tick_period: Duration,
    pub max_pulse_frequency: Duration,
    pub pulse_policy: PulsePolicy,
    pub display_limit: u32,
}

impl ServiceConfig<'static> {
    pub const fn new() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME,
            tick_period: TICK_PERIOD,
            max_pulse_frequency: MAX_PULSE_FREQUENCY,
            pulse_policy: PulsePolicy::new(),
            display_limit: DISPLAY_LIMIT,
        }
    }
}

impl ServiceConfig<'_> {
    /// Same configuration answering to `name`.
    #[must_use]
    pub const fn with_name<'n>(self, name: &'n str) -> ServiceConfig<'n> {
        ServiceConfig {
            name,
            tick_period: self.tick_period,
            max_pulse_frequency: self.max_pulse_frequency,
            pulse_policy: self.pulse_policy,
            display_limit: self.display_limit,
        }
    }
}

impl Default for ServiceConfig<'static> {
    fn default() -> Self {
        Self::new()
    }
}
