mod support;

use release_core::actuator::{DEFAULT_ACTUATORS, MAX_ACTUATORS, NoopActuatorDriver};
use release_core::config::ServiceConfig;
use release_core::feedback::NoopStatusIndicator;
use release_core::protocol::{self, DecodeError, Message};
use release_core::service::{
    DispatchError, KeyReleaseService, NoopTickControl, ServiceComponents, ServiceRegistry,
};
use release_core::session::SessionKey;
use release_core::telemetry::NoopTelemetry;

use support::{MockInstant, call, request};

fn with_registry<F>(test: F)
where
    F: FnOnce(&mut ServiceRegistry<'_, MockInstant>),
{
    let mut service = KeyReleaseService::<_, _, _, _, _, MAX_ACTUATORS>::new(
        ServiceConfig::new(),
        &DEFAULT_ACTUATORS,
        ServiceComponents::new(
            NoopActuatorDriver,
            NoopStatusIndicator,
            NoopTickControl,
            NoopTelemetry,
        ),
        SessionKey::from_seed(77),
        MockInstant::secs(0),
    )
    .expect("service builds");
    let mut registry = ServiceRegistry::new();
    registry.register(&mut service).expect("registers");
    test(&mut registry);
}

#[test]
fn encoded_request_matches_wire_layout() {
    let frame = request("keys start", &["0", "60"]);
    assert_eq!(
        frame.as_slice(),
        b"\x00\x11\x02keys start\x000\x0060\x00\x00\x00"
    );
}

#[test]
fn messages_round_trip_through_the_codec() {
    let payload = [0x00, 0xFF, 0x10];
    let cases = [
        Message::new("keys actuators"),
        Message::with_parameters("keys add", &["1", "30"]).expect("fits"),
        Message::with_parameters("keys release", &["0", ""]).expect("fits"),
        Message::with_parameters("blob", &["x"])
            .expect("fits")
            .with_binary(&payload),
    ];
    for message in cases {
        let frame = message.to_frame().expect("encodes");
        assert_eq!(protocol::decode(&frame), Ok(message));
    }
}

#[test]
fn unknown_service_gets_zero_length_reply() {
    with_registry(|registry| {
        assert_eq!(call(registry, MockInstant::secs(0), "lights on", &[]), None);
        assert_eq!(call(registry, MockInstant::secs(0), "keys explode", &["0"]), None);
    });
}

#[test]
fn malformed_parameters_get_wrong_parameter() {
    with_registry(|registry| {
        assert_eq!(
            call(registry, MockInstant::secs(0), "keys arm", &["zero"]).as_deref(),
            Some("WrongParameter")
        );
        assert_eq!(
            call(registry, MockInstant::secs(0), "keys arm", &[]).as_deref(),
            Some("WrongParameter")
        );
        assert_eq!(
            call(registry, MockInstant::secs(0), "keys status", &["5"]).as_deref(),
            Some("WrongParameter")
        );
    });
}

#[test]
fn declared_size_mismatch_is_rejected() {
    with_registry(|registry| {
        let mut frame = request("keys status", &["0"]);
        frame[1] += 1;
        let mut out = [0u8; 64];
        assert!(matches!(
            registry.dispatch(&frame, MockInstant::secs(0), &mut out),
            Err(DispatchError::Decode(DecodeError::LengthMismatch { .. }))
                | Err(DispatchError::Decode(DecodeError::Unterminated))
        ));
    });
}

#[test]
fn short_binary_section_is_rejected() {
    let mut frame = request("keys status", &["0"]);
    let len = frame.len();
    frame[len - 1] = 4;
    frame.extend_from_slice(&[1, 2]).expect("room for payload");
    assert_eq!(
        protocol::decode(&frame),
        Err(DecodeError::InsufficientPayload {
            declared: 4,
            available: 2
        })
    );
}

#[test]
fn default_catalog_is_served() {
    with_registry(|registry| {
        assert_eq!(
            call(registry, MockInstant::secs(0), "keys actuators", &[]).as_deref(),
            Some("2")
        );
        assert_eq!(
            call(registry, MockInstant::secs(0), "keys available", &["1"]).as_deref(),
            Some("7200")
        );
    });
}

#[test]
fn oversized_parameter_list_is_dropped() {
    let nine = ["1"; 9];
    let mut frame: heapless::Vec<u8, 64> = heapless::Vec::new();
    let text_len: u16 = 1 + 2 + 2 * 9;
    frame.extend_from_slice(&text_len.to_be_bytes()).expect("room");
    frame.push(9).expect("room");
    frame.extend_from_slice(b"k\0").expect("room");
    for parameter in nine {
        frame.extend_from_slice(parameter.as_bytes()).expect("room");
        frame.push(0).expect("room");
    }
    frame.extend_from_slice(&[0x00, 0x00]).expect("room");

    with_registry(|registry| {
        let mut out = [0u8; 64];
        assert_eq!(
            registry.dispatch(&frame, MockInstant::secs(0), &mut out),
            Err(DispatchError::Decode(DecodeError::TooManyParameters(9)))
        );
    });
    assert!(Message::with_parameters("k", &nine).is_err());
}
