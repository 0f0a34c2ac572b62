use embassy_net::Stack;
use embassy_net::udp::{PacketMetadata, UdpSocket};

use super::SharedRegistry;
use crate::clock::FirmwareInstant;
use crate::power::ActivityMonitor;
use crate::transport::{self, DATAGRAM_LEN, SERVICE_PORT};
use crate::usb::NetDevice;

const QUEUED_DATAGRAMS: usize = 4;

#[embassy_executor::task]
pub async fn run(mut runner: embassy_net::Runner<'static, NetDevice>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
pub async fn serve(
    stack: Stack<'static>,
    registry: &'static SharedRegistry,
    activity: &'static ActivityMonitor,
) -> ! {
    stack.wait_config_up().await;

    let mut rx_meta = [PacketMetadata::EMPTY; QUEUED_DATAGRAMS];
    let mut rx_buffer = [0u8; DATAGRAM_LEN * QUEUED_DATAGRAMS];
    let mut tx_meta = [PacketMetadata::EMPTY; QUEUED_DATAGRAMS];
    let mut tx_buffer = [0u8; DATAGRAM_LEN * QUEUED_DATAGRAMS];

    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket
        .bind(SERVICE_PORT)
        .expect("failed to bind service port");
    defmt::info!("udp: serving on port {}", SERVICE_PORT);

    let mut datagram = [0u8; DATAGRAM_LEN];
    let mut reply = [0u8; DATAGRAM_LEN];
    loop {
        let (len, meta) = match socket.recv_from(&mut datagram).await {
            Ok(received) => received,
            Err(error) => {
                defmt::warn!("udp: receive failed: {}", defmt::Debug2Format(&error));
                continue;
            }
        };

        let now = FirmwareInstant::now();
        activity.note(now);
        let answered = registry.lock(|cell| {
            transport::answer(&mut *cell.borrow_mut(), &datagram[..len], now, &mut reply)
        });

        if let Some(reply_len) = answered
            && let Err(error) = socket.send_to(&reply[..reply_len], meta.endpoint).await
        {
            defmt::warn!("udp: reply failed: {}", defmt::Debug2Format(&error));
        }
    }
}
