//! Hardware boundary for the robot core.
//!
//! The core never touches registers. Everything it needs from the board
//! (pin I/O, servo and PWM outputs, a microsecond clock and a cooperative
//! sleep) goes through the [`Board`] trait, addressed by logical pin numbers
//! that a [`PinMap`] binds to roles.

use embedded_hal::digital::PinState;
use serde::{Deserialize, Serialize};

use super::drive::Side;

/// Logical pin number as understood by the board implementation.
pub type Pin = u8;

/// Full-scale value accepted by [`Board::analog_write`].
pub const MAX_DUTY: u16 = 1023;

/// Pin-level access, timing and sleep primitives consumed by the core.
#[allow(async_fn_in_trait)]
pub trait Board {
    type Error: core::fmt::Debug;

    fn digital_write(
        &mut self,
        pin: Pin,
        level: PinState,
    ) -> Result<(), Self::Error>;

    fn digital_read(
        &mut self,
        pin: Pin,
    ) -> Result<PinState, Self::Error>;

    /// Write an angle-like servo value (0..=180, 90 being neutral for a
    /// continuous servo).
    fn servo_write(
        &mut self,
        pin: Pin,
        value: f32,
    ) -> Result<(), Self::Error>;

    fn servo_configure(
        &mut self,
        pin: Pin,
        pulse_width_us: u16,
        continuous: bool,
    ) -> Result<(), Self::Error>;

    /// Write a PWM duty in the range `0..=MAX_DUTY`.
    fn analog_write(
        &mut self,
        pin: Pin,
        duty: u16,
    ) -> Result<(), Self::Error>;

    /// Monotonic microsecond timestamp.
    fn now_micros(&mut self) -> u64;

    /// Yield to other tasks for at least `ms` milliseconds.
    async fn sleep_ms(
        &mut self,
        ms: u32,
    );
}

/// Servo and motor terminal bindings for one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelPins {
    /// Continuous servo signal pin.
    pub servo: Pin,
    /// Motor terminal driven for the "forward" winding.
    pub forward: Pin,
    /// Motor terminal driven for the "backward" winding.
    pub backward: Pin,
}

/// Pin role reassignment, the payload of `configure_pins`.
///
/// Serialized as JSON with tag `"role"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum PinRole {
    Led { pin: Pin },
    Servo { side: Side, pin: Pin },
    Motor { side: Side, forward: Pin, backward: Pin },
    Ultrasonic { trigger: Pin, echo: Pin },
    LineSensor { side: Side, pin: Pin },
}

/// Process-lifetime pin bindings for every peripheral the core drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    pub led: Pin,
    pub right: WheelPins,
    pub left: WheelPins,
    pub trigger: Pin,
    pub echo: Pin,
    pub line_right: Pin,
    pub line_left: Pin,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            led: 0,
            right: WheelPins {
                servo: 1,
                forward: 1,
                backward: 3,
            },
            left: WheelPins {
                servo: 2,
                forward: 2,
                backward: 4,
            },
            trigger: 8,
            echo: 16,
            line_right: 5,
            line_left: 6,
        }
    }
}

impl PinMap {
    pub fn wheel(
        &self,
        side: Side,
    ) -> &WheelPins {
        match side {
            Side::Right => &self.right,
            Side::Left => &self.left,
        }
    }

    fn wheel_mut(
        &mut self,
        side: Side,
    ) -> &mut WheelPins {
        match side {
            Side::Right => &mut self.right,
            Side::Left => &mut self.left,
        }
    }

    pub fn line_sensor(
        &self,
        side: Side,
    ) -> Pin {
        match side {
            Side::Right => self.line_right,
            Side::Left => self.line_left,
        }
    }

    /// Rebind the pins of one role.
    pub fn assign(
        &mut self,
        role: PinRole,
    ) {
        match role {
            PinRole::Led { pin } => self.led = pin,
            PinRole::Servo { side, pin } => self.wheel_mut(side).servo = pin,
            PinRole::Motor {
                side,
                forward,
                backward,
            } => {
                let wheel = self.wheel_mut(side);
                wheel.forward = forward;
                wheel.backward = backward;
            }
            PinRole::Ultrasonic { trigger, echo } => {
                self.trigger = trigger;
                self.echo = echo;
            }
            PinRole::LineSensor { side, pin } => match side {
                Side::Right => self.line_right = pin,
                Side::Left => self.line_left = pin,
            },
        }
        tracing::info!(?role, "pin binding updated");
    }
}
