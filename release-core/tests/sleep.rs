mod support;

use core::time::Duration;

use release_core::actuator::{Actuator, NoopActuatorDriver};
use release_core::config::ServiceConfig;
use release_core::feedback::NoopStatusIndicator;
use release_core::service::{
    KeyReleaseService, NoopTickControl, ServiceComponents, ServiceRegistry,
};
use release_core::session::SessionKey;
use release_core::sleep::{SleepGrant, SleepMode};
use release_core::telemetry::{TelemetryEventKind, TelemetryRecorder};

use support::{MockInstant, call};

const PAIR: [Actuator; 2] = [
    Actuator::new("PA0", 3_600, 7_200, 0, 90),
    Actuator::new("PA1", 3_600, 7_200, 0, 90),
];

type Service = KeyReleaseService<
    'static,
    MockInstant,
    NoopActuatorDriver,
    NoopStatusIndicator,
    NoopTickControl,
    TelemetryRecorder<MockInstant, 32>,
>;

fn build() -> Service {
    KeyReleaseService::new(
        ServiceConfig::new(),
        &PAIR,
        ServiceComponents::new(
            NoopActuatorDriver,
            NoopStatusIndicator,
            NoopTickControl,
            TelemetryRecorder::new(),
        ),
        SessionKey::from_seed(1),
        MockInstant::secs(0),
    )
    .expect("service builds")
}

fn countdown(service: &mut Service, index: &str, seconds: &str) {
    let now = MockInstant::secs(0);
    service.execute("arm", &[index], now);
    service.execute("start", &[index, seconds], now);
}

const fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}

#[test]
fn idle_device_sleeps_as_requested() {
    let mut service = build();
    let grant = service.negotiate_sleep(secs(600), SleepMode::DeepSleep, MockInstant::secs(0));
    assert_eq!(grant, SleepGrant::new(secs(600), SleepMode::DeepSleep));
}

#[test]
fn single_release_within_window_keeps_deep_sleep() {
    let mut service = build();
    countdown(&mut service, "0", "300");
    let grant = service.negotiate_sleep(secs(600), SleepMode::DeepSleep, MockInstant::secs(0));
    assert_eq!(grant, SleepGrant::new(secs(300), SleepMode::DeepSleep));
}

#[test]
fn single_release_beyond_window_downgrades() {
    let mut service = build();
    countdown(&mut service, "0", "900");
    let grant = service.negotiate_sleep(secs(600), SleepMode::DeepSleep, MockInstant::secs(0));
    assert_eq!(grant, SleepGrant::new(secs(600), SleepMode::LightSleep));
}

#[test]
fn two_releases_force_light_sleep() {
    let mut service = build();
    countdown(&mut service, "0", "100");
    countdown(&mut service, "1", "200");
    let grant = service.negotiate_sleep(secs(500), SleepMode::DeepSleep, MockInstant::secs(0));
    assert_eq!(grant, SleepGrant::new(secs(200), SleepMode::LightSleep));
}

#[test]
fn registry_folds_and_records_grants() {
    let mut service = build();
    countdown(&mut service, "0", "300");
    {
        let mut registry: ServiceRegistry<'_, MockInstant> = ServiceRegistry::new();
        registry.register(&mut service).expect("registers");
        let grant = registry.sleep_requested(secs(600), SleepMode::DeepSleep, MockInstant::secs(0));
        assert_eq!(grant, SleepGrant::new(secs(300), SleepMode::DeepSleep));

        // deep sleep resets the device; the release happens on reboot
        registry.reboot(MockInstant::secs(300));
        assert_eq!(
            call(&mut registry, MockInstant::secs(300), "keys running", &["0"]).as_deref(),
            Some("0")
        );
        assert_eq!(
            call(&mut registry, MockInstant::secs(300), "keys status", &["0"]).as_deref(),
            Some("Idle")
        );
    }

    let latest_grant = service
        .telemetry()
        .oldest_first()
        .filter(|record| matches!(record.event, TelemetryEventKind::SleepGranted(_)))
        .last()
        .copied();
    let record = latest_grant.expect("grant recorded");
    assert_eq!(record.event, TelemetryEventKind::SleepGranted(SleepMode::DeepSleep));
    assert_eq!(record.seconds, 300);
}
