use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Ipv4Address, Ipv4Cidr, StackResources, StaticConfigV4};
use embassy_stm32 as hal;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use release_core::actuator::DEFAULT_ACTUATORS;
use release_core::config::ServiceConfig;
use release_core::service::{KeyReleaseService, ServiceComponents};
use release_core::session::SessionKey;
use static_cell::StaticCell;

use crate::clock::FirmwareInstant;
use crate::indicator::{IndicatorSignal, PwmRgb, SignalIndicator};
use crate::power::ActivityMonitor;
use crate::servo::{PwmServoBank, SERVO_FREQUENCY_HZ};
use crate::telemetry::LoggedTelemetry;
use crate::tick::TickGate;
use crate::transport::FirmwareRegistry;
use crate::usb::{UsbDeviceStrings, UsbNetwork, UsbNetworkStorage};

mod indicator_task;
mod net_task;
mod power_task;
mod tick_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Sockets the stack has to track: the service port plus headroom.
const NET_SOCKETS: usize = 2;

/// Static address of the board on the USB link.
const DEVICE_ADDRESS: Ipv4Address = Ipv4Address::new(192, 168, 7, 1);
const LINK_PREFIX: u8 = 24;

/// Frequency of the RGB channels.
const LED_PWM_HZ: u32 = 1_000;

type FirmwareService = KeyReleaseService<
    'static,
    FirmwareInstant,
    PwmServoBank<'static>,
    SignalIndicator<'static>,
    &'static TickGate,
    LoggedTelemetry,
>;

pub(super) type SharedRegistry =
    Mutex<ThreadModeRawMutex, RefCell<FirmwareRegistry<'static>>>;

pub(super) static TICK_GATE: TickGate = TickGate::new();
pub(super) static INDICATOR: IndicatorSignal = IndicatorSignal::new();
pub(super) static ACTIVITY: ActivityMonitor = ActivityMonitor::new();

static SERVICE: StaticCell<FirmwareService> = StaticCell::new();
static REGISTRY: StaticCell<SharedRegistry> = StaticCell::new();
static USB_STORAGE: StaticCell<UsbNetworkStorage> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<NET_SOCKETS>> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        TIM2,
        PA0,
        PA1,
        TIM3,
        PA6,
        PA7,
        PB0,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let servo_pwm = SimplePwm::new(
        TIM2,
        Some(PwmPin::new(PA0, OutputType::PushPull)),
        Some(PwmPin::new(PA1, OutputType::PushPull)),
        None,
        None,
        Hertz(SERVO_FREQUENCY_HZ),
        Default::default(),
    );
    let led_pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        Some(PwmPin::new(PB0, OutputType::PushPull)),
        None,
        Hertz(LED_PWM_HZ),
        Default::default(),
    );

    let boot = FirmwareInstant::now();
    let seed = session_seed(embassy_stm32::uid::uid(), boot);
    let session_key = SessionKey::from_seed(seed);

    let service = SERVICE.init(
        KeyReleaseService::new(
            ServiceConfig::new(),
            &DEFAULT_ACTUATORS,
            ServiceComponents::new(
                PwmServoBank::new(servo_pwm),
                SignalIndicator::new(&INDICATOR),
                &TICK_GATE,
                LoggedTelemetry::new(),
            ),
            session_key,
            boot,
        )
        .expect("key release service"),
    );
    defmt::info!(
        "boot: {} actuators, session key {}",
        service.durations().len(),
        session_key.value()
    );

    let mut registry = FirmwareRegistry::new();
    registry
        .register(service)
        .expect("key release service registration");
    let registry: &'static SharedRegistry = REGISTRY.init(Mutex::new(RefCell::new(registry)));

    let driver = embassy_stm32::usb::Driver::new(USB, UsbIrqs, PA12, PA11);
    let UsbNetwork {
        device,
        runner: ncm_runner,
        net_device,
    } = UsbNetwork::new(
        driver,
        USB_STORAGE.init(UsbNetworkStorage::new()),
        UsbDeviceStrings::default(),
    );

    let net_config = NetConfig::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(DEVICE_ADDRESS, LINK_PREFIX),
        gateway: None,
        dns_servers: Default::default(),
    });
    let (stack, net_runner) = embassy_net::new(
        net_device,
        net_config,
        NET_RESOURCES.init(StackResources::new()),
        u64::from(seed),
    );

    spawner
        .spawn(usb_task::run(device))
        .expect("failed to spawn USB task");
    spawner
        .spawn(usb_task::ncm(ncm_runner))
        .expect("failed to spawn NCM task");
    spawner
        .spawn(net_task::run(net_runner))
        .expect("failed to spawn network task");
    spawner
        .spawn(net_task::serve(stack, registry, &ACTIVITY))
        .expect("failed to spawn UDP service task");
    spawner
        .spawn(tick_task::run(registry, &TICK_GATE))
        .expect("failed to spawn tick task");
    spawner
        .spawn(indicator_task::run(PwmRgb::new(led_pwm), &INDICATOR))
        .expect("failed to spawn indicator task");
    spawner
        .spawn(power_task::run(registry, &ACTIVITY))
        .expect("failed to spawn power task");

    core::future::pending::<()>().await;
}

/// Folds the 96-bit device ID into the boot timestamp.
#[allow(clippy::cast_possible_truncation)]
fn session_seed(uid: &[u8; 12], boot: FirmwareInstant) -> u32 {
    let ticks = boot.into_embassy().as_ticks();
    uid.chunks_exact(4)
        .fold((ticks ^ (ticks >> 32)) as u32, |seed, word| {
            seed ^ u32::from_le_bytes([word[0], word[1], word[2], word[3]])
        })
}
