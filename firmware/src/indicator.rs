//! RGB status LED.
//!
//! The key release service drives a [`SignalIndicator`], which publishes the
//! desired output to the indicator task. The task owns the TIM3 PWM and
//! renders pulses as a triangle wave in 20 ms frames.

use core::time::Duration;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::signal::Signal;
use release_core::feedback::{FULL_BRIGHTNESS, StatusIndicator};
use smart_leds::RGB8;

#[cfg(target_os = "none")]
use embassy_stm32::peripherals::TIM3;
#[cfg(target_os = "none")]
use embassy_stm32::timer::simple_pwm::SimplePwm;

#[cfg(target_os = "none")]
type IndicatorMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type IndicatorMutex = NoopRawMutex;

/// Rendering step while pulsing.
pub const FRAME: Duration = Duration::from_millis(20);

/// Output requested by the service.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorState {
    pub color: RGB8,
    pub brightness: u8,
    pub pulse: Option<Duration>,
}

impl IndicatorState {
    pub const fn new() -> Self {
        Self {
            color: RGB8 { r: 0, g: 0, b: 0 },
            brightness: FULL_BRIGHTNESS,
            pulse: None,
        }
    }

    /// Colour to show `elapsed` into the current pulse.
    pub fn frame(&self, elapsed: Duration) -> RGB8 {
        let level = match self.pulse {
            Some(period) => pulse_level(elapsed, period),
            None => FULL_BRIGHTNESS,
        };
        scaled(self.color, scale(self.brightness, level))
    }
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self::new()
    }
}

pub type IndicatorSignal = Signal<IndicatorMutex, IndicatorState>;

/// [`StatusIndicator`] that forwards every change to the indicator task.
pub struct SignalIndicator<'a> {
    signal: &'a IndicatorSignal,
    state: IndicatorState,
}

impl<'a> SignalIndicator<'a> {
    pub const fn new(signal: &'a IndicatorSignal) -> Self {
        Self {
            signal,
            state: IndicatorState::new(),
        }
    }

    pub fn state(&self) -> IndicatorState {
        self.state
    }

    fn publish(&mut self) {
        self.signal.signal(self.state);
    }
}

impl StatusIndicator for SignalIndicator<'_> {
    fn set_color(&mut self, color: RGB8) {
        self.state.color = color;
        self.publish();
    }

    fn set_brightness(&mut self, brightness: u8) {
        self.state.brightness = brightness;
        self.publish();
    }

    fn pulse(&mut self, period: Duration) {
        self.state.pulse = Some(period);
        self.publish();
    }

    fn stop_pulse(&mut self) {
        self.state.pulse = None;
        self.publish();
    }
}

/// Triangle wave: dark at the start of each period, full halfway through.
pub fn pulse_level(elapsed: Duration, period: Duration) -> u8 {
    let period_ms = period.as_millis();
    if period_ms == 0 {
        return FULL_BRIGHTNESS;
    }
    let phase = elapsed.as_millis() % period_ms;
    let half = period_ms.div_ceil(2);
    let rising = if phase < half { phase } else { period_ms - phase };
    let level = rising * u128::from(FULL_BRIGHTNESS) / half;
    u8::try_from(level).unwrap_or(FULL_BRIGHTNESS)
}

pub fn scaled(color: RGB8, level: u8) -> RGB8 {
    RGB8 {
        r: scale(color.r, level),
        g: scale(color.g, level),
        b: scale(color.b, level),
    }
}

fn scale(value: u8, level: u8) -> u8 {
    let product = u16::from(value) * u16::from(level) / u16::from(FULL_BRIGHTNESS);
    u8::try_from(product).unwrap_or(u8::MAX)
}

pub fn channel_duty(value: u8, max_duty: u16) -> u16 {
    let duty = u32::from(value) * u32::from(max_duty) / u32::from(FULL_BRIGHTNESS);
    u16::try_from(duty).unwrap_or(max_duty)
}

/// Common-cathode RGB LED on TIM3 CH1..CH3.
#[cfg(target_os = "none")]
pub struct PwmRgb<'d> {
    pwm: SimplePwm<'d, TIM3>,
}

#[cfg(target_os = "none")]
impl<'d> PwmRgb<'d> {
    pub fn new(mut pwm: SimplePwm<'d, TIM3>) -> Self {
        pwm.ch1().enable();
        pwm.ch2().enable();
        pwm.ch3().enable();
        Self { pwm }
    }

    pub fn show(&mut self, color: RGB8) {
        let max_duty = self.pwm.max_duty_cycle();
        self.pwm.ch1().set_duty_cycle(channel_duty(color.r, max_duty));
        self.pwm.ch2().set_duty_cycle(channel_duty(color.g, max_duty));
        self.pwm.ch3().set_duty_cycle(channel_duty(color.b, max_duty));
    }
}
