//! Hobby servo drive for the release hooks.
//!
//! Each actuator is one TIM2 channel running at 50 Hz. The hook angle maps
//! linearly onto a 500..2500 us pulse inside the 20 ms frame.

#[cfg(target_os = "none")]
use embassy_stm32::peripherals::TIM2;
#[cfg(target_os = "none")]
use embassy_stm32::timer::simple_pwm::{SimplePwm, SimplePwmChannel};
#[cfg(target_os = "none")]
use release_core::actuator::{Actuator, ActuatorDriver, HookPosition};

pub const SERVO_FREQUENCY_HZ: u32 = 50;
pub const FRAME_US: u32 = 1_000_000 / SERVO_FREQUENCY_HZ;
pub const MIN_PULSE_US: u32 = 500;
pub const MAX_PULSE_US: u32 = 2_500;
pub const MAX_ANGLE: u8 = 180;

/// Time a servo needs to reach its start position after attach.
#[cfg(target_os = "none")]
const ATTACH_SETTLE: embassy_time::Duration = embassy_time::Duration::from_millis(300);

/// Pulse width commanding `angle` degrees.
pub fn pulse_width_us(angle: u8) -> u32 {
    let angle = u32::from(angle.min(MAX_ANGLE));
    MIN_PULSE_US + angle * (MAX_PULSE_US - MIN_PULSE_US) / u32::from(MAX_ANGLE)
}

/// Compare value for `angle` given the timer's full-scale duty.
pub fn duty_for(angle: u8, max_duty: u16) -> u16 {
    let duty = pulse_width_us(angle) * u32::from(max_duty) / FRAME_US;
    u16::try_from(duty).unwrap_or(max_duty)
}

/// Servo bank on the four TIM2 channels.
#[cfg(target_os = "none")]
pub struct PwmServoBank<'d> {
    pwm: SimplePwm<'d, TIM2>,
}

#[cfg(target_os = "none")]
impl<'d> PwmServoBank<'d> {
    pub fn new(pwm: SimplePwm<'d, TIM2>) -> Self {
        Self { pwm }
    }

    fn channel(&mut self, index: usize) -> Option<SimplePwmChannel<'_, TIM2>> {
        match index {
            0 => Some(self.pwm.ch1()),
            1 => Some(self.pwm.ch2()),
            2 => Some(self.pwm.ch3()),
            3 => Some(self.pwm.ch4()),
            _ => None,
        }
    }

    fn drive(&mut self, index: usize, actuator: &Actuator, position: HookPosition) {
        let max_duty = self.pwm.max_duty_cycle();
        let angle = actuator.angle(position);
        match self.channel(index) {
            Some(mut channel) => {
                channel.set_duty_cycle(duty_for(angle, max_duty));
                defmt::debug!("servo: {} ({}) -> {} deg", index, actuator.pin, angle);
            }
            None => defmt::warn!("servo: no channel for actuator {}", index),
        }
    }
}

#[cfg(target_os = "none")]
impl ActuatorDriver for PwmServoBank<'_> {
    fn attach(&mut self, index: usize, actuator: &Actuator) {
        if let Some(mut channel) = self.channel(index) {
            channel.enable();
        }
        self.drive(index, actuator, HookPosition::Released);
        embassy_time::block_for(ATTACH_SETTLE);
    }

    fn arm(&mut self, index: usize, actuator: &Actuator) {
        self.drive(index, actuator, HookPosition::Armed);
    }

    fn release(&mut self, index: usize, actuator: &Actuator) {
        self.drive(index, actuator, HookPosition::Released);
    }
}
