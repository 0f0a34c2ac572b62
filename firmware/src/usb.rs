//! USB CDC-NCM link.
//!
//! The board enumerates as a USB Ethernet adapter. The NCM class is turned
//! into an `embassy-net` device so the UDP transport runs over it unchanged.

use embassy_usb::class::cdc_ncm::embassy_net::{Device, Runner, State as NetState};
use embassy_usb::class::cdc_ncm::{CdcNcmClass, State};
use embassy_usb::driver::Driver;
use embassy_usb::{Builder, UsbDevice};

/// Ethernet frame size carried by the link.
pub const MTU: usize = 1514;
pub const MAX_PACKET_SIZE: u16 = 64;

/// Frames buffered per direction between NCM and the IP stack.
const NET_QUEUE_DEPTH: usize = 4;

const CONTROL_BUFFER_LEN: usize = 128;
const CONFIG_DESCRIPTOR_LEN: usize = 256;
const BOS_DESCRIPTOR_LEN: usize = 256;
const MSOS_DESCRIPTOR_LEN: usize = 256;

/// MAC address of the board's end of the link.
pub const DEVICE_MAC: [u8; 6] = [0x02, 0x4B, 0x52, 0x00, 0x00, 0x01];
/// MAC address the host assigns to its side of the adapter.
pub const HOST_MAC: [u8; 6] = [0x02, 0x4B, 0x52, 0x00, 0x00, 0x02];

pub type NetDevice = Device<'static, MTU>;

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Key Release",
            product: "Timed Key Release",
            serial_number: None,
        }
    }
}

/// Backing storage for the builder, the NCM class and its network adapter.
pub struct UsbNetworkStorage {
    control_buf: [u8; CONTROL_BUFFER_LEN],
    config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
    bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
    msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
    ncm_state: State<'static>,
    net_state: NetState<MTU, NET_QUEUE_DEPTH, NET_QUEUE_DEPTH>,
}

impl UsbNetworkStorage {
    pub fn new() -> Self {
        Self {
            control_buf: [0; CONTROL_BUFFER_LEN],
            config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
            bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
            msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
            ncm_state: State::new(),
            net_state: NetState::new(),
        }
    }
}

/// The USB device, the NCM runner and the network device handed to `embassy-net`.
pub struct UsbNetwork<D>
where
    D: Driver<'static>,
{
    pub device: UsbDevice<'static, D>,
    pub runner: Runner<'static, D, MTU>,
    pub net_device: NetDevice,
}

impl<D> UsbNetwork<D>
where
    D: Driver<'static>,
{
    pub fn new(
        driver: D,
        storage: &'static mut UsbNetworkStorage,
        strings: UsbDeviceStrings,
    ) -> Self {
        let UsbNetworkStorage {
            control_buf,
            config_descriptor,
            bos_descriptor,
            msos_descriptor,
            ncm_state,
            net_state,
        } = storage;

        let mut config = embassy_usb::Config::new(0x1209, 0x0001);
        config.manufacturer = Some(strings.manufacturer);
        config.product = Some(strings.product);
        config.serial_number = strings.serial_number;
        config.max_packet_size_0 = 64;
        config.max_power = 100;
        config.device_class = 0xEF;
        config.device_sub_class = 0x02;
        config.device_protocol = 0x01;
        config.composite_with_iads = true;

        let mut builder = Builder::new(
            driver,
            config,
            config_descriptor,
            bos_descriptor,
            msos_descriptor,
            control_buf,
        );

        let class = CdcNcmClass::new(&mut builder, ncm_state, HOST_MAC, MAX_PACKET_SIZE);
        let device = builder.build();
        let (runner, net_device) = class
            .into_embassy_net_device::<MTU, NET_QUEUE_DEPTH, NET_QUEUE_DEPTH>(net_state, DEVICE_MAC);

        Self {
            device,
            runner,
            net_device,
        }
    }
}
