//! Motion primitives on top of the selected actuation backend.
//!
//! `MotionController` owns the drivetrain chosen at initialization and turns
//! direction/speed/distance/angle intents into backend writes. Distance and
//! angle moves are open loop: full speed for a duration computed by
//! [`DriveKinematics`], then stop.

use core::fmt;

use libm;
use serde::{Deserialize, Serialize};

use super::{
    board::{Board, PinMap},
    drive::{ActuationBackend, Backend, DcMotorDrive, Direction, Drivetrain, ServoDrive, Side},
};
use crate::utils::math::kinematics::{to_centimeters, Calibration, DriveKinematics, Unit};

/// Longest distance accepted by a distance move (cm).
pub const MAX_DISTANCE_CM: f32 = 200.0;
/// Largest turn accepted by an angle move (degrees).
pub const MAX_ANGLE_DEG: f32 = 360.0;
/// Highest speed percentage.
pub const MAX_SPEED: f32 = 100.0;

/// Errors raised by the robot core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobotError<E: fmt::Debug> {
    /// The board rejected a pin operation.
    Board(E),
    /// Motion requested before a backend was selected.
    NotConfigured,
    /// A numeric argument was not a finite number.
    InvalidArgument(&'static str),
}

impl<E: fmt::Debug> fmt::Display for RobotError<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            RobotError::Board(e) => write!(f, "board error: {:?}", e),
            RobotError::NotConfigured => f.write_str("no actuation backend selected"),
            RobotError::InvalidArgument(what) => write!(f, "invalid {}", what),
        }
    }
}

/// Retrievable fault status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// A motion primitive ran before `initialize`.
    NotConfigured,
}

/// Clamp a user-supplied number into `[min, max]`, rejecting NaN and infinities.
pub fn clamp_arg<E: fmt::Debug>(
    value: f32,
    min: f32,
    max: f32,
    what: &'static str,
) -> Result<f32, RobotError<E>> {
    if !value.is_finite() {
        return Err(RobotError::InvalidArgument(what));
    }
    Ok(value.clamp(min, max))
}

pub struct MotionController {
    drivetrain: Option<Drivetrain>,
    calibration: Calibration,
    kinematics: DriveKinematics,
    fault: Option<Fault>,
}

impl MotionController {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            drivetrain: None,
            kinematics: DriveKinematics::from_calibration(&calibration),
            calibration,
            fault: None,
        }
    }

    pub fn backend(&self) -> Option<Backend> {
        self.drivetrain.as_ref().map(Drivetrain::backend)
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn kinematics(&self) -> &DriveKinematics {
        &self.kinematics
    }

    /// Select (or reselect) the actuation backend and bring its actuators
    /// to rest. Clears any pending fault.
    pub fn select_backend<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
        backend: Backend,
    ) -> Result<(), RobotError<B::Error>> {
        if let Some(previous) = self.drivetrain.take() {
            previous.stop(board, pins).map_err(RobotError::Board)?;
        }
        let drivetrain = match backend {
            Backend::Servo => Drivetrain::Servo(ServoDrive::new(self.calibration.servo)),
            Backend::DcMotor => Drivetrain::DcMotor(DcMotorDrive::new(self.calibration.dc)),
        };
        drivetrain.configure(board, pins).map_err(RobotError::Board)?;
        self.drivetrain = Some(drivetrain);
        self.fault = None;
        tracing::info!(?backend, "actuation backend selected");
        Ok(())
    }

    /// Replace the calibration record. Takes effect on the next backend
    /// selection for backend-scoped values, immediately for geometry.
    pub fn set_calibration(
        &mut self,
        calibration: Calibration,
    ) {
        self.kinematics = DriveKinematics::from_calibration(&calibration);
        self.calibration = calibration;
    }

    fn ready<E: fmt::Debug>(&mut self) -> Result<Drivetrain, RobotError<E>> {
        match self.drivetrain {
            Some(d) => Ok(d),
            None => {
                self.fault = Some(Fault::NotConfigured);
                tracing::warn!("motion requested before backend selection");
                Err(RobotError::NotConfigured)
            }
        }
    }

    /// Drive straight in `direction` at `speed` percent.
    pub fn drive<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
        direction: Direction,
        speed: f32,
    ) -> Result<(), RobotError<B::Error>> {
        let drivetrain = self.ready::<B::Error>()?;
        let speed = clamp_arg::<B::Error>(speed, 0.0, MAX_SPEED, "speed")?;
        drivetrain
            .drive(board, pins, direction, speed)
            .map_err(RobotError::Board)
    }

    /// Hold time for an open-loop distance move with the active backend.
    pub fn distance_hold_ms<E: fmt::Debug>(
        &mut self,
        distance: f32,
        unit: Unit,
    ) -> Result<u32, RobotError<E>> {
        let drivetrain = self.ready::<E>()?;
        let distance = clamp_arg::<E>(distance, 0.0, f32::MAX, "distance")?;
        let cm = to_centimeters(distance, unit).min(MAX_DISTANCE_CM);
        Ok(self.kinematics.travel_time_ms(cm, drivetrain.rpm()))
    }

    /// Hold time for an open-loop turn of `angle` degrees with the active backend.
    pub fn angle_hold_ms<E: fmt::Debug>(
        &mut self,
        angle: f32,
    ) -> Result<u32, RobotError<E>> {
        let drivetrain = self.ready::<E>()?;
        let angle = clamp_arg::<E>(libm::fabsf(angle), 0.0, MAX_ANGLE_DEG, "angle")?;
        Ok(self.kinematics.turn_time_ms(angle, drivetrain.rpm()))
    }

    /// Travel `distance` at full speed, then stop. Returns the hold time in ms.
    pub async fn drive_distance<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
        direction: Direction,
        distance: f32,
        unit: Unit,
    ) -> Result<u32, RobotError<B::Error>> {
        let hold_ms = self.distance_hold_ms::<B::Error>(distance, unit)?;
        self.drive(board, pins, direction, MAX_SPEED)?;
        board.sleep_ms(hold_ms).await;
        self.stop(board, pins)?;
        Ok(hold_ms)
    }

    /// Spin in place toward `side` at `speed` percent.
    pub fn rotate<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        speed: f32,
    ) -> Result<(), RobotError<B::Error>> {
        let drivetrain = self.ready::<B::Error>()?;
        let speed = clamp_arg::<B::Error>(speed, 0.0, MAX_SPEED, "speed")?;
        drivetrain
            .rotate(board, pins, side, speed)
            .map_err(RobotError::Board)
    }

    /// Turn by `angle` degrees toward `side` at full speed, then stop.
    ///
    /// A negative angle turns toward the opposite side. Returns the hold time
    /// in ms.
    pub async fn rotate_angle<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        angle: f32,
    ) -> Result<u32, RobotError<B::Error>> {
        let hold_ms = self.angle_hold_ms::<B::Error>(angle)?;
        let side = if angle < 0.0 { side.opposite() } else { side };
        self.rotate(board, pins, side, MAX_SPEED)?;
        board.sleep_ms(hold_ms).await;
        self.stop(board, pins)?;
        Ok(hold_ms)
    }

    /// Drive a single wheel without touching the other one.
    pub fn control_wheel<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> Result<(), RobotError<B::Error>> {
        let drivetrain = self.ready::<B::Error>()?;
        let speed = clamp_arg::<B::Error>(speed, 0.0, MAX_SPEED, "speed")?;
        drivetrain
            .control_wheel(board, pins, side, direction, speed)
            .map_err(RobotError::Board)
    }

    /// Bring the active backend to rest. A no-op without a backend, and never
    /// raises a fault.
    pub fn stop<B: Board>(
        &mut self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<(), RobotError<B::Error>> {
        match self.drivetrain {
            Some(d) => d.stop(board, pins).map_err(|e| {
                tracing::error!(?e, "failed to stop drivetrain");
                RobotError::Board(e)
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_arg_policy() {
        assert_eq!(clamp_arg::<()>(150.0, 0.0, 100.0, "speed"), Ok(100.0));
        assert_eq!(clamp_arg::<()>(-3.0, 0.0, 100.0, "speed"), Ok(0.0));
        assert_eq!(
            clamp_arg::<()>(f32::NAN, 0.0, 100.0, "speed"),
            Err(RobotError::InvalidArgument("speed"))
        );
    }

    #[test]
    fn hold_time_requires_backend() {
        let mut motion = MotionController::new(Calibration::default());
        assert_eq!(
            motion.distance_hold_ms::<()>(10.0, Unit::Centimeters),
            Err(RobotError::NotConfigured)
        );
        assert_eq!(motion.fault(), Some(Fault::NotConfigured));
        motion.clear_fault();
        assert_eq!(motion.fault(), None);
    }
}
