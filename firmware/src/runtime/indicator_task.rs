use core::time::Duration;

use embassy_futures::select::{Either, select};
use embassy_time::{Instant, Timer};

use crate::clock::core_duration_to_embassy;
use crate::indicator::{FRAME, IndicatorSignal, IndicatorState, PwmRgb};

#[embassy_executor::task]
pub async fn run(mut led: PwmRgb<'static>, signal: &'static IndicatorSignal) -> ! {
    let mut state = IndicatorState::new();
    let mut phase_start = Instant::now();
    led.show(state.frame(Duration::ZERO));

    loop {
        let next = if state.pulse.is_some() {
            match select(signal.wait(), Timer::after(core_duration_to_embassy(FRAME))).await {
                Either::First(next) => Some(next),
                Either::Second(()) => None,
            }
        } else {
            Some(signal.wait().await)
        };

        if let Some(next) = next {
            if next.pulse != state.pulse {
                phase_start = Instant::now();
            }
            state = next;
        }

        let elapsed = Duration::from_micros(phase_start.elapsed().as_micros());
        led.show(state.frame(elapsed));
    }
}
