//! Datagram handling for the UDP service port.
//!
//! One datagram carries exactly one frame. Frames that fail to decode are
//! dropped with a log line and unclaimed frames get no answer.

use release_core::protocol::MAX_FRAME_LEN;
use release_core::service::{DispatchError, ServiceRegistry};

use crate::clock::FirmwareInstant;

/// UDP port the registry listens on.
pub const SERVICE_PORT: u16 = 5_000;

/// Largest datagram accepted or produced.
pub const DATAGRAM_LEN: usize = MAX_FRAME_LEN;

/// Services reachable over the link.
pub const REGISTRY_CAPACITY: usize = 2;

pub type FirmwareRegistry<'a> = ServiceRegistry<'a, FirmwareInstant, REGISTRY_CAPACITY>;

/// Dispatches `datagram` and returns the length of the reply to send, if any.
pub fn answer<const N: usize>(
    registry: &mut ServiceRegistry<'_, FirmwareInstant, N>,
    datagram: &[u8],
    now: FirmwareInstant,
    reply: &mut [u8],
) -> Option<usize> {
    match registry.dispatch(datagram, now, reply) {
        Ok(0) => None,
        Ok(len) => Some(len),
        Err(error) => {
            log_dispatch_error(datagram.len(), error);
            None
        }
    }
}

#[cfg(target_os = "none")]
fn log_dispatch_error(len: usize, error: DispatchError) {
    defmt::warn!("udp: dropping datagram len={}: {}", len, error);
}

#[cfg(not(target_os = "none"))]
fn log_dispatch_error(len: usize, error: DispatchError) {
    println!("udp: dropping datagram len={len}: {error}");
}
