use super::{create_device, map, FilterWheel, REGISTERED_DEVICES};
use crate::{
    config::{SessionConfig, WheelConfig},
    device::{ActionType, Device, Property, PropertyValue},
    error::WheelError,
    kinesis::sim::{Call, SimulatedBench},
    session::SessionState,
};
use std::sync::atomic::{AtomicU32, Ordering};

fn serial() -> String {
    static NEXT: AtomicU32 = AtomicU32::new(40_200_000);
    NEXT.fetch_add(1, Ordering::SeqCst).to_string()
}

fn config(sn: &str) -> WheelConfig {
    WheelConfig {
        serial_number: sn.to_string(),
        delay_ms: 0,
        session: SessionConfig {
            poll_interval_ms: 1,
            home_timeout_ms: 30,
            move_timeout_ms: 30,
            queue_poll_ms: 1,
            enable_settle_ms: 0,
            max_speed: 7200,
        },
    }
}

fn wheel() -> (SimulatedBench, FilterWheel<SimulatedBench>, String) {
    let sn = serial();
    let bench = SimulatedBench::with_device(&sn);
    let wheel = FilterWheel::new(bench.clone(), config(&sn));
    (bench, wheel, sn)
}

fn initialized() -> (SimulatedBench, FilterWheel<SimulatedBench>, String) {
    let (bench, mut wheel, sn) = wheel();
    wheel.initialize().unwrap();
    bench.clear_calls();
    (bench, wheel, sn)
}

#[test]
fn factory() {
    let sn = serial();
    let device = create_device(
        "FW103H Filter Wheel",
        SimulatedBench::with_device(&sn),
        config(&sn),
    )
    .unwrap();
    assert_eq!(device.name(), "FW103H Filter Wheel");
    assert!(device.property_names().contains(&"Serial Number"));
    assert!(create_device("FW102C Filter Wheel", SimulatedBench::new(), config(&sn)).is_none());
    assert_eq!(
        REGISTERED_DEVICES,
        [("FW103H Filter Wheel", "Thorlabs FW103H filter wheel driver")]
    );
}

#[test]
fn initialize_seeds_caches() {
    let (bench, mut wheel, sn) = wheel();
    wheel.set_delay_ms(60_000);

    wheel.initialize().unwrap();

    assert!(wheel.is_initialized());
    assert_eq!(wheel.position(), 0);
    assert_eq!(wheel.speed(), 7200);
    assert!(!wheel.busy());
    assert!(bench.is_open(&sn));
    assert_eq!(wheel.session().unwrap().state(), SessionState::Ready);
}

#[test]
fn initialize_twice() {
    let (bench, mut wheel, _) = initialized();
    wheel.initialize().unwrap();
    assert!(bench.calls().is_empty());
}

#[test]
fn serial_number_only_before_initialize() {
    let (bench, mut wheel, sn) = wheel();
    let other = serial();
    bench.add_device(&other, "FW103H filter wheel", 40);

    let mut prop = Property::new(map::SERIAL_NUMBER, other.as_str());
    wheel
        .on_serial_number(&mut prop, ActionType::AfterSet)
        .unwrap();
    wheel.initialize().unwrap();
    assert!(bench.is_open(&other));
    assert!(!bench.is_open(&sn));

    let mut prop = Property::new(map::SERIAL_NUMBER, sn.as_str());
    assert_eq!(
        wheel.on_serial_number(&mut prop, ActionType::AfterSet),
        Err(WheelError::SerialNumberChangeForbidden)
    );
    assert_eq!(prop.value(), &PropertyValue::String(other.clone()));
    assert_eq!(
        wheel.get_property(map::SERIAL_NUMBER),
        Ok(PropertyValue::String(other))
    );
}

#[test]
fn poll_time_only_before_initialize() {
    let (bench, mut wheel, sn) = wheel();

    wheel
        .set_property(map::POLL_TIME, PropertyValue::Integer(50))
        .unwrap();
    wheel.initialize().unwrap();
    assert_eq!(bench.polling(&sn), Some(50));

    let mut prop = Property::new(map::POLL_TIME, 100i64);
    assert_eq!(
        wheel.on_poll_time(&mut prop, ActionType::AfterSet),
        Err(WheelError::PollChangeForbidden)
    );
    assert_eq!(prop.value(), &PropertyValue::Integer(50));
}

#[test]
fn invalid_poll_times() {
    let (_, mut wheel, _) = wheel();
    for (value, err) in [
        (PropertyValue::Integer(0), WheelError::InvalidPollInterval(0)),
        (PropertyValue::Integer(-5), WheelError::InvalidPollInterval(-5)),
        (
            PropertyValue::from("often"),
            WheelError::InvalidPropertyType(map::POLL_TIME.to_string()),
        ),
    ] {
        let mut prop = Property::new(map::POLL_TIME, value);
        assert_eq!(wheel.on_poll_time(&mut prop, ActionType::AfterSet), Err(err));
        assert_eq!(prop.value(), &PropertyValue::Integer(1));
    }
}

#[test]
fn state_round_trip() {
    let (_, mut wheel, _) = initialized();
    for index in [3, 0, 5, 1, 4, 2] {
        wheel
            .set_property(map::STATE, PropertyValue::Integer(index))
            .unwrap();
        assert_eq!(
            wheel.get_property(map::STATE),
            Ok(PropertyValue::Integer(index))
        );
    }
}

#[test]
fn invalid_state_is_reverted() {
    let (bench, mut wheel, _) = initialized();
    wheel
        .set_property(map::STATE, PropertyValue::Integer(2))
        .unwrap();
    bench.clear_calls();

    for index in [6, -1, 100] {
        let mut prop = Property::new(map::STATE, index);
        assert_eq!(
            wheel.on_state(&mut prop, ActionType::AfterSet),
            Err(WheelError::InvalidPosition(index))
        );
        assert_eq!(prop.value(), &PropertyValue::Integer(2));
    }
    assert!(bench.calls().is_empty());
}

#[test]
fn state_before_initialize() {
    let (bench, mut wheel, _) = wheel();
    assert_eq!(
        wheel.set_property(map::STATE, PropertyValue::Integer(1)),
        Err(WheelError::SessionClosed)
    );
    assert!(bench.calls().is_empty());
    assert_eq!(wheel.position(), 0);
}

#[test]
fn move_timeout_faults_until_shutdown() {
    let (bench, mut wheel, _) = initialized();
    wheel
        .set_property(map::STATE, PropertyValue::Integer(1))
        .unwrap();
    bench.set_move_response(None);

    let mut prop = Property::new(map::STATE, 4i64);
    assert_eq!(
        wheel.on_state(&mut prop, ActionType::AfterSet),
        Err(WheelError::MoveTimeout(30))
    );
    assert_eq!(prop.value(), &PropertyValue::Integer(1));
    assert_eq!(wheel.position(), 1);

    bench.clear_calls();
    assert_eq!(
        wheel.set_property(map::STATE, PropertyValue::Integer(2)),
        Err(WheelError::SessionFaulted)
    );
    assert!(bench.calls().is_empty());

    wheel.shutdown().unwrap();
    wheel.initialize().unwrap();
    assert_eq!(wheel.position(), 0);
}

#[test]
fn busy_after_move() {
    let (_, mut wheel, _) = wheel();
    wheel
        .set_property(map::DELAY, PropertyValue::Integer(60_000))
        .unwrap();
    wheel.initialize().unwrap();
    assert!(!wheel.busy());
    assert_eq!(wheel.last_change(), None);

    wheel
        .set_property(map::STATE, PropertyValue::Integer(3))
        .unwrap();
    assert!(wheel.busy());
    assert!(wheel.last_change().is_some());

    wheel
        .set_property(map::DELAY, PropertyValue::Integer(0))
        .unwrap();
    assert!(!wheel.busy());
}

#[test]
fn busy_window_expires() {
    let (_, mut wheel, _) = initialized();
    wheel.set_delay_ms(20);

    wheel
        .set_property(map::STATE, PropertyValue::Integer(1))
        .unwrap();
    assert!(wheel.busy());
    std::thread::sleep(std::time::Duration::from_millis(40));
    assert!(!wheel.busy());

    // a new initialize starts out idle again
    wheel.set_delay_ms(60_000);
    wheel
        .set_property(map::STATE, PropertyValue::Integer(2))
        .unwrap();
    wheel.shutdown().unwrap();
    wheel.initialize().unwrap();
    assert!(!wheel.busy());
}

#[test]
fn negative_delay() {
    let (_, mut wheel, _) = wheel();
    wheel.set_delay_ms(20);
    assert_eq!(
        wheel.set_property(map::DELAY, PropertyValue::Integer(-1)),
        Err(WheelError::InvalidPropertyType(map::DELAY.to_string()))
    );
    assert_eq!(wheel.get_property(map::DELAY), Ok(PropertyValue::Integer(20)));
}

#[test]
fn speed_changes() {
    let (bench, mut wheel, sn) = initialized();

    wheel
        .set_property(map::SPEED, PropertyValue::Integer(3600))
        .unwrap();
    assert_eq!(wheel.get_property(map::SPEED), Ok(PropertyValue::Integer(3600)));
    assert_eq!(bench.device_vel_params(&sn).max_velocity, 3600);

    bench.clear_calls();
    wheel
        .set_property(map::SPEED, PropertyValue::Integer(0))
        .unwrap();
    assert_eq!(wheel.speed(), 3600);
    assert_eq!(
        bench.count_calls(|c| matches!(c, Call::SetVelParams(_))),
        0
    );
}

#[test]
fn invalid_speed_is_reverted() {
    let (bench, mut wheel, _) = initialized();
    for speed in [7201, -1] {
        let mut prop = Property::new(map::SPEED, speed);
        assert_eq!(
            wheel.on_speed(&mut prop, ActionType::AfterSet),
            Err(WheelError::InvalidSpeed(speed))
        );
        assert_eq!(prop.value(), &PropertyValue::Integer(7200));
    }
    assert!(bench.calls().is_empty());
}

#[test]
fn angle_is_read_from_device() {
    let (_, mut wheel, _) = initialized();
    wheel
        .set_property(map::STATE, PropertyValue::Integer(2))
        .unwrap();

    match wheel.get_property(map::ANGLE) {
        Ok(PropertyValue::Float(angle)) => assert!((angle - 120.0).abs() < 0.01),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        wheel.set_property(map::ANGLE, PropertyValue::Float(60.0)),
        Err(WheelError::NotImplemented)
    );
}

#[test]
fn read_only_properties() {
    let (_, mut wheel, _) = wheel();
    assert_eq!(
        wheel.get_property(map::NAME),
        Ok(PropertyValue::from("FW103H Filter Wheel"))
    );
    assert_eq!(
        wheel.get_property(map::DESCRIPTION),
        Ok(PropertyValue::from("Thorlabs FW103H filter wheel driver"))
    );

    let mut prop = Property::new(map::NAME, "Other");
    assert_eq!(
        wheel.on_name(&mut prop, ActionType::AfterSet),
        Err(WheelError::ReadOnlyProperty(map::NAME.to_string()))
    );
    assert_eq!(prop.value(), &PropertyValue::from("FW103H Filter Wheel"));
}

#[test]
fn unknown_property() {
    let (_, mut wheel, _) = wheel();
    assert_eq!(
        wheel.get_property("Label"),
        Err(WheelError::UnknownProperty("Label".to_string()))
    );
}

#[test]
fn shutdown_is_idempotent() {
    let (bench, mut wheel, sn) = initialized();
    wheel.shutdown().unwrap();
    assert!(!bench.is_open(&sn));
    assert!(!wheel.is_initialized());

    bench.clear_calls();
    wheel.shutdown().unwrap();
    assert!(bench.calls().is_empty());
}

#[test]
fn drop_shuts_down() {
    let (bench, wheel, sn) = initialized();
    drop(wheel);
    assert!(!bench.is_open(&sn));
    assert_eq!(
        bench.count_calls(|c| matches!(c, Call::Close(_))),
        1
    );
}

#[test]
fn failed_homing_needs_shutdown() {
    let (bench, mut wheel, sn) = wheel();
    bench.set_home_response(None);

    assert_eq!(wheel.initialize(), Err(WheelError::HomeTimeout(30)));
    assert!(!wheel.is_initialized());
    assert_eq!(wheel.initialize(), Err(WheelError::SessionFaulted));

    bench.set_home_response(Some(crate::kinesis::Message::new(2, 0)));
    wheel.shutdown().unwrap();
    assert!(!bench.is_open(&sn));
    wheel.initialize().unwrap();
    assert!(wheel.is_initialized());
}

#[test]
fn serial_number_fixable_after_failed_initialize() {
    let sn = serial();
    let bench = SimulatedBench::with_device(&sn);
    let mut wheel = FilterWheel::new(bench.clone(), config("49999999"));

    assert_eq!(
        wheel.initialize(),
        Err(WheelError::DeviceNotFound("49999999".to_string()))
    );
    wheel
        .set_property(map::SERIAL_NUMBER, PropertyValue::String(sn.clone()))
        .unwrap();
    wheel.initialize().unwrap();
    assert!(bench.is_open(&sn));
}
