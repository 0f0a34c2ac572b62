//! Single-threaded UDP server.
//!
//! The socket read timeout is bounded by the next tick deadline, so datagram
//! dispatch and the one-second tick never run concurrently.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use release_core::protocol::MAX_FRAME_LEN;
use release_core::service::ServiceRegistry;
use release_core::sleep::SleepMode;
use tracing::{debug, info, warn};

use crate::host::HostTicker;

#[derive(Copy, Clone, Debug)]
pub struct ServerOptions {
    pub tick_period: Duration,
    /// Quiet period after which sleep is requested; `None` never sleeps.
    pub idle_sleep: Option<Duration>,
    /// Window asked for on each sleep request.
    pub sleep_request: Duration,
}

pub struct Server<'r, 't> {
    socket: UdpSocket,
    registry: ServiceRegistry<'r, Instant>,
    ticker: &'t HostTicker,
    options: ServerOptions,
    next_tick: Instant,
    last_activity: Instant,
    datagram: [u8; MAX_FRAME_LEN],
    reply: [u8; MAX_FRAME_LEN],
}

impl<'r, 't> Server<'r, 't> {
    pub fn new(
        socket: UdpSocket,
        registry: ServiceRegistry<'r, Instant>,
        ticker: &'t HostTicker,
        options: ServerOptions,
    ) -> Self {
        let now = Instant::now();
        Self {
            socket,
            registry,
            ticker,
            options,
            next_tick: now + options.tick_period,
            last_activity: now,
            datagram: [0; MAX_FRAME_LEN],
            reply: [0; MAX_FRAME_LEN],
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("reading bound address")
    }

    pub fn run(&mut self) -> Result<()> {
        info!(address = %self.local_addr()?, "serving");
        loop {
            self.poll()?;
        }
    }

    /// Runs the tick if it is due, otherwise waits for one datagram until the
    /// tick deadline.
    pub fn poll(&mut self) -> Result<()> {
        let now = Instant::now();
        if now >= self.next_tick {
            self.tick(now);
            self.maybe_sleep(now);
            return Ok(());
        }

        self.socket
            .set_read_timeout(Some(self.next_tick - now))
            .context("setting read timeout")?;
        match self.socket.recv_from(&mut self.datagram) {
            Ok((len, peer)) => self.serve(len, peer),
            Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(())
            }
            Err(error) => Err(error).context("receiving datagram"),
        }
    }

    fn tick(&mut self, now: Instant) {
        let due = self.ticker.claim();
        for _ in 0..due {
            self.registry.tick(now);
        }
        self.next_tick += self.options.tick_period;
        if self.next_tick < now {
            self.next_tick = now + self.options.tick_period;
        }
    }

    fn serve(&mut self, len: usize, peer: SocketAddr) -> Result<()> {
        let now = Instant::now();
        self.last_activity = now;
        match self
            .registry
            .dispatch(&self.datagram[..len], now, &mut self.reply)
        {
            Ok(0) => debug!(%peer, len, "unclaimed frame"),
            Ok(reply_len) => {
                self.socket
                    .send_to(&self.reply[..reply_len], peer)
                    .with_context(|| format!("replying to {peer}"))?;
            }
            Err(error) => warn!(%peer, len, %error, "dropping datagram"),
        }
        Ok(())
    }

    fn maybe_sleep(&mut self, now: Instant) {
        let Some(idle) = self.options.idle_sleep else {
            return;
        };
        if now.duration_since(self.last_activity) < idle {
            return;
        }
        self.last_activity = now;

        let grant = self
            .registry
            .sleep_requested(self.options.sleep_request, SleepMode::DeepSleep, now);
        match grant.mode {
            SleepMode::None => debug!("sleep refused"),
            SleepMode::LightSleep => {
                debug!(seconds = grant.duration.as_secs(), "light sleep granted");
            }
            SleepMode::DeepSleep if grant.duration.is_zero() => {}
            SleepMode::DeepSleep => {
                info!(seconds = grant.duration.as_secs(), "deep sleep");
                thread::sleep(grant.duration);
                let woke = Instant::now();
                self.registry.reboot(woke);
                self.last_activity = woke;
                self.next_tick = woke + self.options.tick_period;
            }
        }
    }
}
