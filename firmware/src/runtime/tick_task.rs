use embassy_time::Ticker;
use release_core::config::TICK_PERIOD;

use super::SharedRegistry;
use crate::clock::{FirmwareInstant, core_duration_to_embassy};
use crate::tick::TickGate;

#[embassy_executor::task]
pub async fn run(registry: &'static SharedRegistry, gate: &'static TickGate) -> ! {
    let mut ticker = Ticker::every(core_duration_to_embassy(TICK_PERIOD));
    loop {
        ticker.next().await;
        let due = gate.claim();
        if due == 0 {
            defmt::debug!("tick: deferred, command in progress");
            continue;
        }

        registry.lock(|cell| {
            let mut registry = cell.borrow_mut();
            for _ in 0..due {
                registry.tick(FirmwareInstant::now());
            }
        });
    }
}
