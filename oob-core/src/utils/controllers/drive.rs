//! Actuation backends for the two supported drivetrains.
//!
//! A robot is built either with a pair of continuous-rotation servos or with
//! a pair of DC gear motors behind a dual H-bridge. Both are driven through
//! [`ActuationBackend`]; [`Drivetrain`] holds whichever one was selected.
//!
//! Wheels are mounted mirrored, so "forward" for the chassis means opposite
//! servo offsets and opposite motor terminals on the two sides. Every backend
//! method takes chassis-frame directions and does the mirroring itself.

use serde::{Deserialize, Serialize};

use super::board::{Board, Pin, PinMap};
use crate::utils::math::kinematics::{speed_to_duty, DcCalibration, ServoCalibration};

/// Actuation technology fitted to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Servo,
    DcMotor,
}

/// Chassis travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// `+1` forward, `-1` backward.
    pub fn sign(self) -> f32 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Robot side, used for turn direction and for wheel/sensor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Right,
    Left,
}

impl Side {
    /// `-1` right, `+1` left.
    pub fn sign(self) -> f32 {
        match self {
            Side::Right => -1.0,
            Side::Left => 1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Right => Side::Left,
            Side::Left => Side::Right,
        }
    }
}

/// Converts normalized motion commands into actuator writes.
///
/// `speed` is always a percentage already clamped to `0..=100`.
pub trait ActuationBackend {
    /// Wheel speed at 100 %, revolutions per minute.
    fn rpm(&self) -> f32;

    /// Prepare the actuators right after the backend is selected.
    fn configure<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error>;

    /// Drive one wheel in the chassis frame, leaving the other untouched.
    fn control_wheel<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> Result<(), B::Error>;

    /// Put every actuator in its neutral / zero-power state.
    fn stop<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error>;

    /// Drive both wheels the same way.
    fn drive<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        direction: Direction,
        speed: f32,
    ) -> Result<(), B::Error> {
        self.control_wheel(board, pins, Side::Right, direction, speed)?;
        self.control_wheel(board, pins, Side::Left, direction, speed)
    }

    /// Spin in place toward `side`: the wheel on `side` runs backward, the
    /// other forward.
    fn rotate<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        speed: f32,
    ) -> Result<(), B::Error> {
        self.control_wheel(board, pins, side, Direction::Backward, speed)?;
        self.control_wheel(board, pins, side.opposite(), Direction::Forward, speed)
    }
}

/// Continuous-rotation servo pair.
#[derive(Debug, Clone, Copy)]
pub struct ServoDrive {
    cal: ServoCalibration,
}

impl ServoDrive {
    pub fn new(cal: ServoCalibration) -> Self {
        Self { cal }
    }

    /// Servo value that moves `side`'s wheel in `direction` at `speed`.
    ///
    /// The right servo is mounted mirrored, so its offset is negated.
    pub fn wheel_value(
        &self,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> f32 {
        let offset = direction.sign() * speed * self.cal.gain;
        match side {
            Side::Right => self.cal.neutral - offset,
            Side::Left => self.cal.neutral + offset,
        }
    }
}

impl ActuationBackend for ServoDrive {
    fn rpm(&self) -> f32 {
        self.cal.rpm
    }

    fn configure<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error> {
        board.servo_configure(pins.right.servo, self.cal.pulse_width_us, true)?;
        board.servo_configure(pins.left.servo, self.cal.pulse_width_us, true)?;
        self.stop(board, pins)
    }

    fn control_wheel<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> Result<(), B::Error> {
        let value = self.wheel_value(side, direction, speed);
        board.servo_write(pins.wheel(side).servo, value)
    }

    fn stop<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error> {
        board.servo_write(pins.right.servo, self.cal.neutral)?;
        board.servo_write(pins.left.servo, self.cal.neutral)
    }
}

/// DC gear-motor pair behind a dual H-bridge, one PWM input per terminal.
#[derive(Debug, Clone, Copy)]
pub struct DcMotorDrive {
    cal: DcCalibration,
}

impl DcMotorDrive {
    pub fn new(cal: DcCalibration) -> Self {
        Self { cal }
    }

    /// `(driven, idle)` terminals that move `side`'s wheel in `direction`.
    ///
    /// The left motor is mirrored: chassis-forward is its backward terminal.
    pub fn terminals(
        pins: &PinMap,
        side: Side,
        direction: Direction,
    ) -> (Pin, Pin) {
        let wheel = pins.wheel(side);
        let winding = match side {
            Side::Right => direction,
            Side::Left => direction.reversed(),
        };
        match winding {
            Direction::Forward => (wheel.forward, wheel.backward),
            Direction::Backward => (wheel.backward, wheel.forward),
        }
    }
}

impl ActuationBackend for DcMotorDrive {
    fn rpm(&self) -> f32 {
        self.cal.rpm
    }

    fn configure<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error> {
        self.stop(board, pins)
    }

    fn control_wheel<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> Result<(), B::Error> {
        let (driven, idle) = Self::terminals(pins, side, direction);
        // never leave both terminals of one bridge energised
        board.analog_write(idle, 0)?;
        board.analog_write(driven, speed_to_duty(speed))
    }

    fn stop<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error> {
        for wheel in [&pins.right, &pins.left] {
            board.analog_write(wheel.forward, 0)?;
            board.analog_write(wheel.backward, 0)?;
        }
        Ok(())
    }
}

/// The backend selected at initialization.
#[derive(Debug, Clone, Copy)]
pub enum Drivetrain {
    Servo(ServoDrive),
    DcMotor(DcMotorDrive),
}

impl Drivetrain {
    pub fn backend(&self) -> Backend {
        match self {
            Drivetrain::Servo(_) => Backend::Servo,
            Drivetrain::DcMotor(_) => Backend::DcMotor,
        }
    }
}

impl ActuationBackend for Drivetrain {
    fn rpm(&self) -> f32 {
        match self {
            Drivetrain::Servo(d) => d.rpm(),
            Drivetrain::DcMotor(d) => d.rpm(),
        }
    }

    fn configure<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error> {
        match self {
            Drivetrain::Servo(d) => d.configure(board, pins),
            Drivetrain::DcMotor(d) => d.configure(board, pins),
        }
    }

    fn control_wheel<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> Result<(), B::Error> {
        match self {
            Drivetrain::Servo(d) => d.control_wheel(board, pins, side, direction, speed),
            Drivetrain::DcMotor(d) => d.control_wheel(board, pins, side, direction, speed),
        }
    }

    fn stop<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), B::Error> {
        match self {
            Drivetrain::Servo(d) => d.stop(board, pins),
            Drivetrain::DcMotor(d) => d.stop(board, pins),
        }
    }
}
