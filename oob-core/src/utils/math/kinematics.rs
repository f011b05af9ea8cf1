//! Open-loop kinematics for a two-wheeled differential-drive robot.
//!
//! Without wheel encoders, a distance or a turn is achieved by running the
//! wheels at a known speed for a computed duration. `DriveKinematics` turns
//! distances and angles into hold times from the calibrated wheel geometry
//! and motor speed, assuming full steady-state speed from the first instant.
//!
//! # Example
//! ```rust
//! use oob_core::utils::math::kinematics::{Calibration, DriveKinematics};
//! let kin = DriveKinematics::from_calibration(&Calibration::default());
//! let hold_ms = kin.travel_time_ms(50.0, 200.0);
//! assert!(hold_ms > 0);
//! ```
use core::f32::consts::PI;

use libm;
use serde::{Deserialize, Serialize};

use crate::utils::controllers::board::MAX_DUTY;

/// Centimetres per inch.
pub const CM_PER_INCH: f32 = 2.54;

/// Distance unit accepted by distance moves and range measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Centimeters,
    Inches,
}

/// Convert a value expressed in `unit` to centimetres.
pub fn to_centimeters(
    value: f32,
    unit: Unit,
) -> f32 {
    match unit {
        Unit::Centimeters => value,
        Unit::Inches => value * CM_PER_INCH,
    }
}

/// Convert centimetres to `unit`.
pub fn from_centimeters(
    cm: f32,
    unit: Unit,
) -> f32 {
    match unit {
        Unit::Centimeters => cm,
        Unit::Inches => cm / CM_PER_INCH,
    }
}

/// Map a speed percentage onto the board's PWM duty scale.
///
/// `speed` must already be clamped to `0..=100`.
pub fn speed_to_duty(speed: f32) -> u16 {
    libm::roundf(speed * MAX_DUTY as f32 / 100.0) as u16
}

/// How the chassis pivots during an in-place rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnModel {
    /// Both wheels counter-rotate about the chassis centre.
    Spin,
    /// The chassis swings around one wheel.
    Pivot,
}

impl TurnModel {
    /// Denominator of the turn-time formula. The wheel arc for an angle `a` is
    /// `a / divisor * 2π * wheel_distance`.
    pub fn divisor(self) -> f32 {
        match self {
            TurnModel::Spin => 720.0,
            TurnModel::Pivot => 360.0,
        }
    }
}

/// Continuous-servo calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoCalibration {
    /// Servo value at which the wheel stands still.
    pub neutral: f32,
    /// Servo value offset per speed percent.
    pub gain: f32,
    /// Pulse width programmed when the servo is configured.
    pub pulse_width_us: u16,
    /// Wheel speed at 100 %, revolutions per minute.
    pub rpm: f32,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            neutral: 90.0,
            gain: 0.9,
            pulse_width_us: 1500,
            rpm: 130.0,
        }
    }
}

/// DC gear-motor calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcCalibration {
    /// Wheel speed at full duty, revolutions per minute.
    pub rpm: f32,
}

impl Default for DcCalibration {
    fn default() -> Self {
        Self { rpm: 200.0 }
    }
}

/// Ultrasonic ranging calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeCalibration {
    /// Centimetres of obstacle distance per microsecond of echo
    /// (speed of sound 0.0343 cm/µs halved for the round trip).
    pub cm_per_us: f32,
    /// Longest echo pulse waited for, in microseconds.
    pub timeout_us: u64,
}

impl Default for RangeCalibration {
    fn default() -> Self {
        Self {
            cm_per_us: 0.0343 / 2.0,
            timeout_us: 8824,
        }
    }
}

/// Per-unit tuning of the drivetrain and sensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub servo: ServoCalibration,
    pub dc: DcCalibration,
    pub range: RangeCalibration,
    /// Wheel radius (cm).
    pub wheel_radius_cm: f32,
    /// Distance between the two wheel contact points (cm).
    pub wheel_distance_cm: f32,
    /// Preset for the turn-time denominator.
    pub turn_model: TurnModel,
    /// Explicit turn-time denominator, overriding `turn_model` (e.g. 180).
    pub turn_divisor: Option<f32>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            servo: ServoCalibration::default(),
            dc: DcCalibration::default(),
            range: RangeCalibration::default(),
            wheel_radius_cm: 2.5,
            wheel_distance_cm: 12.0,
            turn_model: TurnModel::Spin,
            turn_divisor: None,
        }
    }
}

impl Calibration {
    /// Denominator used by [`DriveKinematics::turn_time_ms`].
    pub fn turn_divisor(&self) -> f32 {
        self.turn_divisor.unwrap_or(self.turn_model.divisor())
    }

    /// Check that every speed, length and timing constant is finite and
    /// positive. Returns the name of the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        let checks = [
            (self.servo.rpm, "servo.rpm"),
            (self.dc.rpm, "dc.rpm"),
            (self.wheel_radius_cm, "wheel_radius_cm"),
            (self.wheel_distance_cm, "wheel_distance_cm"),
            (self.turn_divisor(), "turn_divisor"),
            (self.range.cm_per_us, "range.cm_per_us"),
        ];
        if let Some((_, name)) = checks
            .iter()
            .find(|(value, _)| !(value.is_finite() && *value > 0.0))
        {
            return Err(*name);
        }
        if self.range.timeout_us == 0 {
            return Err("range.timeout_us");
        }
        Ok(())
    }
}

/// Timing model of the differential drive.
#[derive(Debug, Clone, Copy)]
pub struct DriveKinematics {
    /// Radius of each wheel (cm)
    wheel_radius: f32,
    /// Wheel-to-wheel distance (cm)
    wheel_distance: f32,
    turn_divisor: f32,
}

impl DriveKinematics {
    pub fn new(
        wheel_radius: f32,
        wheel_distance: f32,
        turn_divisor: f32,
    ) -> Self {
        Self {
            wheel_radius,
            wheel_distance,
            turn_divisor,
        }
    }

    pub fn from_calibration(cal: &Calibration) -> Self {
        Self::new(cal.wheel_radius_cm, cal.wheel_distance_cm, cal.turn_divisor())
    }

    /// Ground distance covered per minute at `rpm`.
    pub fn wheel_speed_cm_per_min(
        &self,
        rpm: f32,
    ) -> f32 {
        rpm * 2.0 * PI * self.wheel_radius
    }

    /// Hold time for travelling `distance_cm` with the wheels at `rpm`.
    pub fn travel_time_ms(
        &self,
        distance_cm: f32,
        rpm: f32,
    ) -> u32 {
        let minutes = distance_cm / self.wheel_speed_cm_per_min(rpm);
        to_millis(minutes)
    }

    /// Hold time for turning the chassis by `angle_deg` with the wheels at `rpm`.
    pub fn turn_time_ms(
        &self,
        angle_deg: f32,
        rpm: f32,
    ) -> u32 {
        let minutes = angle_deg * self.wheel_distance
            / (self.turn_divisor * self.wheel_radius * rpm);
        to_millis(minutes)
    }
}

fn to_millis(minutes: f32) -> u32 {
    if !(minutes > 0.0 && minutes.is_finite()) {
        return 0;
    }
    libm::roundf(minutes * 60_000.0) as u32
}
