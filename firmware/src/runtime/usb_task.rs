use embassy_stm32 as hal;
use embassy_usb::UsbDevice;
use embassy_usb::class::cdc_ncm::embassy_net::Runner;

use crate::usb::MTU;

type UsbDriver = embassy_stm32::usb::Driver<'static, hal::peripherals::USB>;

#[embassy_executor::task]
pub async fn run(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

#[embassy_executor::task]
pub async fn ncm(runner: Runner<'static, UsbDriver, MTU>) -> ! {
    runner.run().await
}
