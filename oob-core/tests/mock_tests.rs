mod common;

use common::{FakeBoard, Write, POLL_US};
use embassy_futures::block_on;
use embedded_hal::digital::PinState;
use oob_core::utils::{
    controllers::{
        Backend, Direction, Fault, FollowerAction, FollowerConfig, HaltReason, PinMap, RangeFinder,
        RobotConfig, RobotContext, RobotError, Side,
    },
    math::kinematics::{RangeCalibration, Unit},
};

fn robot(backend: Option<Backend>) -> RobotContext<FakeBoard> {
    let mut robot = RobotContext::new(FakeBoard::new(), RobotConfig::default());
    if let Some(backend) = backend {
        robot.initialize(backend).unwrap();
    }
    robot
}

fn assert_dc_at_rest(robot: &RobotContext<FakeBoard>) {
    let pins = *robot.pins();
    for pin in [pins.right.forward, pins.right.backward, pins.left.forward, pins.left.backward] {
        assert_eq!(robot.board().analog(pin), 0, "pin {} still driven", pin);
    }
}

fn assert_servo_at_rest(robot: &RobotContext<FakeBoard>) {
    let pins = *robot.pins();
    assert_eq!(robot.board().servo(pins.right.servo), Some(90.0));
    assert_eq!(robot.board().servo(pins.left.servo), Some(90.0));
}

#[test]
fn dc_move_forward_half_speed_then_stop() {
    let mut robot = robot(Some(Backend::DcMotor));
    let pins = *robot.pins();

    robot.drive(Direction::Forward, 50.0).unwrap();
    assert_eq!(robot.board().analog(pins.right.forward), 512);
    assert_eq!(robot.board().analog(pins.left.backward), 512);
    assert_eq!(robot.board().analog(pins.right.backward), 0);
    assert_eq!(robot.board().analog(pins.left.forward), 0);

    robot.stop().unwrap();
    assert_dc_at_rest(&robot);
}

#[test]
fn dc_reversal_releases_the_opposite_terminal() {
    let mut robot = robot(Some(Backend::DcMotor));
    let pins = *robot.pins();

    robot.drive(Direction::Forward, 80.0).unwrap();
    robot.drive(Direction::Backward, 40.0).unwrap();
    assert_eq!(robot.board().analog(pins.right.forward), 0);
    assert_eq!(robot.board().analog(pins.left.backward), 0);
    assert_eq!(robot.board().analog(pins.right.backward), 409);
    assert_eq!(robot.board().analog(pins.left.forward), 409);
}

#[test]
fn move_then_stop_returns_to_neutral_for_every_speed() {
    for backend in [Backend::Servo, Backend::DcMotor] {
        let mut robot = robot(Some(backend));
        for speed in (0..=100).step_by(5) {
            robot.drive(Direction::Forward, speed as f32).unwrap();
            robot.stop().unwrap();
            match backend {
                Backend::Servo => assert_servo_at_rest(&robot),
                Backend::DcMotor => assert_dc_at_rest(&robot),
            }
        }
    }
}

#[test]
fn servo_backend_is_configured_continuous() {
    let robot = robot(Some(Backend::Servo));
    let pins = *robot.pins();
    assert_eq!(
        robot.board().configured,
        vec![(pins.right.servo, 1500, true), (pins.left.servo, 1500, true)]
    );
    assert_servo_at_rest(&robot);
}

#[test]
fn servo_move_is_symmetric_around_neutral() {
    let mut robot = robot(Some(Backend::Servo));
    let pins = *robot.pins();
    robot.drive(Direction::Forward, 50.0).unwrap();
    assert_eq!(robot.board().servo(pins.right.servo), Some(45.0));
    assert_eq!(robot.board().servo(pins.left.servo), Some(135.0));
}

#[test]
fn speed_is_clamped() {
    let mut robot = robot(Some(Backend::DcMotor));
    let pins = *robot.pins();
    robot.drive(Direction::Forward, 250.0).unwrap();
    assert_eq!(robot.board().analog(pins.right.forward), 1023);
    robot.drive(Direction::Forward, -10.0).unwrap();
    assert_eq!(robot.board().analog(pins.right.forward), 0);
    assert_eq!(
        robot.drive(Direction::Forward, f32::NAN),
        Err(RobotError::InvalidArgument("speed"))
    );
}

#[test]
fn motion_before_initialize_faults_without_writing() {
    let mut robot = robot(None);
    assert_eq!(robot.drive(Direction::Forward, 50.0), Err(RobotError::NotConfigured));
    assert_eq!(robot.rotate(Side::Left, 50.0), Err(RobotError::NotConfigured));
    assert_eq!(
        block_on(robot.drive_distance(Direction::Forward, 10.0, Unit::Centimeters)),
        Err(RobotError::NotConfigured)
    );
    assert_eq!(robot.fault(), Some(Fault::NotConfigured));
    assert_eq!(robot.board().write_count(), 0);
    assert!(robot.board().slept.is_empty());

    // stop stays callable while faulted
    assert_eq!(robot.stop(), Ok(()));
    assert_eq!(robot.fault(), Some(Fault::NotConfigured));

    robot.initialize(Backend::DcMotor).unwrap();
    assert_eq!(robot.fault(), None);
    robot.drive(Direction::Forward, 50.0).unwrap();
}

#[test]
fn drive_distance_holds_for_the_computed_time() {
    let mut robot = robot(Some(Backend::DcMotor));
    let expected = robot.motion().kinematics().travel_time_ms(50.0, 200.0);

    let held = block_on(robot.drive_distance(Direction::Forward, 50.0, Unit::Centimeters)).unwrap();
    assert_eq!(held, expected);
    assert_eq!(robot.board().slept, vec![expected]);
    assert_dc_at_rest(&robot);
}

#[test]
fn drive_distance_is_monotonic_and_clamped() {
    let mut robot = robot(Some(Backend::Servo));
    let mut last = 0;
    for cm in (10..=200).step_by(10) {
        let held = block_on(robot.drive_distance(Direction::Forward, cm as f32, Unit::Centimeters))
            .unwrap();
        assert!(held > last, "{} cm held {} ms", cm, held);
        last = held;
    }
    let beyond = block_on(robot.drive_distance(Direction::Backward, 500.0, Unit::Centimeters)).unwrap();
    assert_eq!(beyond, last);
}

#[test]
fn inches_are_converted_before_timing() {
    let mut robot = robot(Some(Backend::DcMotor));
    let inches = block_on(robot.drive_distance(Direction::Forward, 10.0, Unit::Inches)).unwrap();
    let cm = block_on(robot.drive_distance(Direction::Forward, 25.4, Unit::Centimeters)).unwrap();
    assert_eq!(inches, cm);
}

#[test]
fn rotate_angle_turns_then_stops() {
    let mut robot = robot(Some(Backend::Servo));
    let pins = *robot.pins();
    let expected = robot.motion().kinematics().turn_time_ms(90.0, 130.0);

    let held = block_on(robot.rotate_angle(Side::Left, 90.0)).unwrap();
    assert_eq!(held, expected);
    // full-speed left spin drives both servos to the same end stop
    assert!(robot.board().history.contains(&(pins.right.servo, Write::Servo(0.0))));
    assert!(robot.board().history.contains(&(pins.left.servo, Write::Servo(0.0))));
    assert_servo_at_rest(&robot);
}

#[test]
fn negative_angle_turns_the_other_way() {
    let mut robot = robot(Some(Backend::DcMotor));
    let pins = *robot.pins();

    let held = block_on(robot.rotate_angle(Side::Left, -45.0)).unwrap();
    assert_eq!(held, robot.motion().kinematics().turn_time_ms(45.0, 200.0));
    // a right spin energises both backward terminals
    assert!(robot.board().history.contains(&(pins.right.backward, Write::Analog(1023))));
    assert!(robot.board().history.contains(&(pins.left.backward, Write::Analog(1023))));
    assert_dc_at_rest(&robot);
}

#[test]
fn rotate_angle_is_monotonic() {
    let mut robot = robot(Some(Backend::DcMotor));
    let mut last = 0;
    for angle in (15..=360).step_by(15) {
        let held = block_on(robot.rotate_angle(Side::Right, angle as f32)).unwrap();
        assert!(held > last);
        last = held;
    }
}

#[test]
fn control_wheel_leaves_the_other_wheel_alone() {
    let mut robot = robot(Some(Backend::Servo));
    let pins = *robot.pins();
    robot.control_wheel(Side::Left, Direction::Forward, 100.0).unwrap();
    assert_eq!(robot.board().servo(pins.left.servo), Some(180.0));
    assert_eq!(robot.board().servo(pins.right.servo), Some(90.0));
}

#[test]
fn echo_width_maps_to_distance() {
    let ranger = RangeFinder::new(RangeCalibration::default());
    let pins = PinMap::default();
    let mut board = FakeBoard::with_echo(1000);

    let pulse = block_on(ranger.measure_pulse(&mut board, &pins)).unwrap();
    assert!(!pulse.saturated);
    assert!(pulse.end_us >= pulse.start_us);
    assert!(pulse.elapsed_us().abs_diff(1000) <= POLL_US);
    assert_eq!(
        ranger.distance(&pulse, Unit::Centimeters),
        ranger.distance_for_echo(1000, Unit::Centimeters)
    );
}

#[test]
fn measured_distance_grows_with_echo_width() {
    let mut last = 0.0;
    let mut first = None;
    for width in (300..=8300).step_by(400) {
        let mut robot = RobotContext::new(FakeBoard::with_echo(width), RobotConfig::default());
        let cm = block_on(robot.measure_distance(Unit::Centimeters)).unwrap();
        assert!(cm >= last, "width {} gave {} after {}", width, cm, last);
        first.get_or_insert(cm);
        last = cm;
    }
    assert!(last > first.unwrap());
}

#[test]
fn long_or_missing_echo_reads_max_range() {
    let ranger = RangeFinder::new(RangeCalibration::default());
    let max = ranger.max_range(Unit::Centimeters);
    for width in [8824, 9000, 20_000] {
        let mut robot = RobotContext::new(FakeBoard::with_echo(width), RobotConfig::default());
        assert_eq!(block_on(robot.measure_distance(Unit::Centimeters)).unwrap(), max);
    }

    let pins = PinMap::default();
    let pulse = block_on(ranger.measure_pulse(&mut FakeBoard::with_echo(20_000), &pins)).unwrap();
    assert!(pulse.saturated);

    let mut silent = FakeBoard::new();
    let pulse = block_on(ranger.measure_pulse(&mut silent, &pins)).unwrap();
    assert!(pulse.saturated);
    assert_eq!(ranger.distance(&pulse, Unit::Inches), ranger.max_range(Unit::Inches));
}

#[test]
fn proximity_check_uses_measured_distance() {
    let mut robot = RobotContext::new(FakeBoard::with_echo(1000), RobotConfig::default());
    assert!(block_on(robot.is_closer_than(20.0, Unit::Centimeters)).unwrap());
    assert!(block_on(robot.is_closer_than(17.0, Unit::Centimeters)).unwrap());
    assert!(!block_on(robot.is_closer_than(10.0, Unit::Centimeters)).unwrap());
    assert!(block_on(robot.is_closer_than(7.0, Unit::Inches)).unwrap());
}

#[test]
fn missing_echo_is_never_closer() {
    for board in [FakeBoard::new(), FakeBoard::with_echo(20_000)] {
        let mut robot = RobotContext::new(board, RobotConfig::default());
        assert!(!block_on(robot.is_closer_than(200.0, Unit::Centimeters)).unwrap());
        assert!(!block_on(robot.is_closer_than(80.0, Unit::Inches)).unwrap());
    }
}

#[test]
fn trigger_is_pulsed_high_then_low() {
    let mut robot = RobotContext::new(FakeBoard::with_echo(500), RobotConfig::default());
    let trigger = robot.pins().trigger;
    block_on(robot.measure_distance(Unit::Centimeters)).unwrap();
    let writes: Vec<_> = robot
        .board()
        .history
        .iter()
        .filter(|(pin, _)| *pin == trigger)
        .map(|(_, w)| *w)
        .collect();
    assert_eq!(
        writes,
        vec![Write::Digital(PinState::High), Write::Digital(PinState::Low)]
    );
    assert_eq!(robot.board().slept, vec![1]);
}

#[test]
fn line_sensor_reports_dark_as_true() {
    let mut robot = robot(None);
    robot.board_mut().set_line(true, false);
    assert!(robot.line_sensor_state(Side::Left).unwrap());
    assert!(!robot.line_sensor_state(Side::Right).unwrap());
}

#[test]
fn follower_drives_straight_then_stops_on_both_set() {
    let mut robot = robot(Some(Backend::DcMotor));
    let pins = *robot.pins();

    robot.start_line_follow();
    assert_eq!(robot.tick().unwrap(), FollowerAction::DriveStraight);
    assert_eq!(robot.board().analog(pins.right.forward), 512);
    assert_eq!(robot.board().analog(pins.left.backward), 512);

    robot.board_mut().set_line(true, true);
    assert_eq!(
        robot.tick().unwrap(),
        FollowerAction::Halt(HaltReason::BothSensorsSet)
    );
    assert!(!robot.is_following());
    assert_dc_at_rest(&robot);
}

#[test]
fn follower_corrects_then_resumes_straight() {
    let mut robot = robot(Some(Backend::DcMotor));
    let pins = *robot.pins();

    robot.start_line_follow();
    robot.tick().unwrap();

    robot.board_mut().set_line(false, true);
    assert_eq!(robot.tick().unwrap(), FollowerAction::Correct { wheel: Side::Left });
    // left wheel forward at the correction speed, right wheel untouched
    assert_eq!(robot.board().analog(pins.left.backward), 307);
    assert_eq!(robot.board().analog(pins.right.forward), 512);

    let writes = robot.board().write_count();
    assert_eq!(robot.tick().unwrap(), FollowerAction::Hold);
    assert_eq!(robot.board().write_count(), writes);

    robot.board_mut().set_line(false, false);
    assert_eq!(robot.tick().unwrap(), FollowerAction::DriveStraight);
    assert_eq!(robot.board().analog(pins.left.backward), 512);
}

#[test]
fn stop_line_follow_cancels_a_correction_immediately() {
    let mut robot = robot(Some(Backend::Servo));
    robot.start_line_follow();
    robot.board_mut().set_line(true, false);
    assert_eq!(robot.tick().unwrap(), FollowerAction::Correct { wheel: Side::Right });

    robot.stop_line_follow().unwrap();
    assert!(!robot.is_following());
    assert_servo_at_rest(&robot);

    let writes = robot.board().write_count();
    assert_eq!(robot.tick().unwrap(), FollowerAction::Idle);
    assert_eq!(robot.board().write_count(), writes);
}

#[test]
fn stuck_correction_times_out() {
    let mut robot = robot(Some(Backend::DcMotor));
    robot.start_line_follow();
    robot.board_mut().set_line(false, true);
    robot.tick().unwrap();

    let timeout_us = FollowerConfig::default().correction_timeout_ms as u64 * 1000;
    robot.board_mut().advance(timeout_us);
    assert_eq!(
        robot.tick().unwrap(),
        FollowerAction::Halt(HaltReason::CorrectionTimeout)
    );
    assert_dc_at_rest(&robot);
}

#[test]
fn following_without_backend_faults_and_cancels() {
    let mut robot = robot(None);
    robot.start_line_follow();
    assert_eq!(robot.tick(), Err(RobotError::NotConfigured));
    assert!(!robot.is_following());
    assert_eq!(robot.fault(), Some(Fault::NotConfigured));
}

#[test]
fn led_blinks_on_tick() {
    let mut robot = robot(None);
    let led = robot.pins().led;

    robot.blink_led(100).unwrap();
    assert_eq!(robot.board().digital(led), PinState::High);
    robot.tick().unwrap();
    assert_eq!(robot.board().digital(led), PinState::High);

    robot.board_mut().advance(100_000);
    robot.tick().unwrap();
    assert_eq!(robot.board().digital(led), PinState::Low);

    robot.board_mut().advance(100_000);
    robot.tick().unwrap();
    assert_eq!(robot.board().digital(led), PinState::High);

    robot.stop_led_blink().unwrap();
    assert!(!robot.led().is_blinking());
    assert_eq!(robot.board().digital(led), PinState::Low);
}

#[test]
fn steady_led_cancels_blinking() {
    let mut robot = robot(None);
    let led = robot.pins().led;
    robot.blink_led(50).unwrap();
    robot.set_led_state(PinState::High).unwrap();
    robot.board_mut().advance(500_000);
    robot.tick().unwrap();
    assert_eq!(robot.board().digital(led), PinState::High);
    assert!(robot.led().is_lit());
}

#[test]
fn led_keeps_blinking_when_follower_fails() {
    let mut robot = robot(None);
    let led = robot.pins().led;
    robot.blink_led(100).unwrap();
    robot.start_line_follow();

    robot.board_mut().advance(100_000);
    assert_eq!(robot.tick(), Err(RobotError::NotConfigured));
    assert_eq!(robot.board().digital(led), PinState::Low);
    assert!(robot.led().is_blinking());
}
