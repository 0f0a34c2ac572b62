mod host;
mod server;

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use release_core::actuator::{DEFAULT_HOLD_SECONDS, DEFAULT_MAXIMUM_SECONDS};
use release_core::config::{DEFAULT_SERVICE_NAME, ServiceConfig, TICK_PERIOD};
use release_core::service::{KeyReleaseService, ServiceComponents, ServiceRegistry};
use release_core::session::SessionKey;
use tracing::info;

use host::{ConsoleIndicator, EMULATOR_CAPACITY, HostTicker, SimulatedServos, TracingTelemetry};
use server::{Server, ServerOptions};

#[derive(Parser)]
#[command(
    name = "release-emulator",
    about = "Timed key release device served over UDP on the host",
    version
)]
struct Cli {
    /// Address the service socket binds to
    #[arg(long, env = "RELEASE_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Number of simulated actuators
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=16))]
    actuators: u8,

    /// Hold time used by `hold` before any `add`
    #[arg(long, default_value_t = DEFAULT_HOLD_SECONDS)]
    default_seconds: u32,

    /// Ceiling for every timer
    #[arg(long, default_value_t = DEFAULT_MAXIMUM_SECONDS)]
    maximum_seconds: u32,

    /// Namespace the service answers to
    #[arg(long, default_value = DEFAULT_SERVICE_NAME)]
    service: String,

    /// Request deep sleep after this many quiet seconds
    #[arg(long)]
    idle_sleep: Option<u64>,

    /// Sleep window requested once idle, in seconds
    #[arg(long, default_value_t = 600)]
    sleep_request: u64,

    /// Fixed session key seed instead of a random one
    #[arg(long, env = "RELEASE_SEED")]
    seed: Option<u32>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let actuators = host::catalog(
        usize::from(cli.actuators),
        cli.default_seconds,
        cli.maximum_seconds,
    );
    let seed = cli.seed.unwrap_or_else(rand::random);
    let ticker = HostTicker::new();

    let mut service = KeyReleaseService::<_, _, _, _, _, EMULATOR_CAPACITY>::new(
        ServiceConfig::new().with_name(&cli.service),
        &actuators,
        ServiceComponents::new(
            SimulatedServos::new(),
            ConsoleIndicator::new(),
            &ticker,
            TracingTelemetry::new(),
        ),
        SessionKey::from_seed(seed),
        Instant::now(),
    )
    .map_err(|error| anyhow!("building key release service: {error}"))?;
    info!(
        service = %cli.service,
        actuators = actuators.len(),
        session_key = %service.session_key(),
        "device booted"
    );

    let mut registry = ServiceRegistry::new();
    registry
        .register(&mut service)
        .map_err(|error| anyhow!("registering {}: {error}", cli.service))?;

    let socket =
        UdpSocket::bind(cli.bind).with_context(|| format!("binding UDP socket {}", cli.bind))?;
    let mut server = Server::new(
        socket,
        registry,
        &ticker,
        ServerOptions {
            tick_period: TICK_PERIOD,
            idle_sleep: cli.idle_sleep.map(Duration::from_secs),
            sleep_request: Duration::from_secs(cli.sleep_request),
        },
    );
    server.run()
}
