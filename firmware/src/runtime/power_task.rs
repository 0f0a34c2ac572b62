use embassy_time::Timer;

use super::SharedRegistry;
use crate::clock::{FirmwareInstant, core_duration_to_embassy};
use crate::power::{self, ActivityMonitor, POWER_POLL, SLEEP_MODE, SLEEP_REQUEST, SleepAction};

#[embassy_executor::task]
pub async fn run(registry: &'static SharedRegistry, activity: &'static ActivityMonitor) -> ! {
    loop {
        Timer::after(core_duration_to_embassy(POWER_POLL)).await;

        let now = FirmwareInstant::now();
        if !activity.should_request_sleep(now) {
            continue;
        }

        let grant = registry.lock(|cell| {
            cell.borrow_mut()
                .sleep_requested(SLEEP_REQUEST, SLEEP_MODE, now)
        });

        match power::action_for(grant) {
            SleepAction::Stay => {}
            SleepAction::Idle => {
                defmt::debug!("power: light sleep for {}s", grant.duration.as_secs());
            }
            SleepAction::ResetAfter(window) => {
                defmt::info!("power: deep sleep for {}s", window.as_secs());
                Timer::after(core_duration_to_embassy(window)).await;
                if activity.idle_for(FirmwareInstant::now()) < window {
                    defmt::info!("power: deep sleep abandoned, link active");
                    continue;
                }
                cortex_m::peripheral::SCB::sys_reset();
            }
        }
    }
}
