//! Ultrasonic range finder (trigger/echo protocol).
//!
//! A measurement pulses the trigger line, then busy-polls the echo line and
//! timestamps its rising and falling edges against the board's microsecond
//! clock. Both waits are bounded by the calibrated echo timeout; a pulse that
//! hits the bound is reported as saturated and read as the maximum range,
//! meaning "nothing detected".

use embedded_hal::digital::PinState;
use libm;

use super::board::{Board, PinMap};
use crate::utils::math::kinematics::{from_centimeters, RangeCalibration, Unit};

/// How long the trigger line is held high (ms).
const TRIGGER_PULSE_MS: u32 = 1;

/// One timed echo pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseMeasurement {
    /// Last timestamp observed before the echo went high.
    pub start_us: u64,
    /// Last timestamp observed while the echo was high.
    pub end_us: u64,
    /// The echo did not complete within the timeout.
    pub saturated: bool,
}

impl PulseMeasurement {
    pub fn elapsed_us(&self) -> u64 {
        self.end_us.saturating_sub(self.start_us)
    }
}

pub struct RangeFinder {
    cal: RangeCalibration,
}

impl RangeFinder {
    pub fn new(cal: RangeCalibration) -> Self {
        Self { cal }
    }

    pub fn set_calibration(
        &mut self,
        cal: RangeCalibration,
    ) {
        self.cal = cal;
    }

    /// Distance for a given echo width, rounded for `unit`.
    ///
    /// Rounding happens after the unit conversion: whole centimetres, or
    /// tenths of an inch.
    pub fn distance_for_echo(
        &self,
        elapsed_us: u64,
        unit: Unit,
    ) -> f32 {
        let cm = elapsed_us as f32 * self.cal.cm_per_us;
        match unit {
            Unit::Centimeters => libm::roundf(cm),
            Unit::Inches => libm::roundf(from_centimeters(cm, Unit::Inches) * 10.0) / 10.0,
        }
    }

    /// Reading returned when no echo arrives within the timeout.
    pub fn max_range(
        &self,
        unit: Unit,
    ) -> f32 {
        self.distance_for_echo(self.cal.timeout_us, unit)
    }

    /// Convert a measurement to a distance in `unit`.
    pub fn distance(
        &self,
        pulse: &PulseMeasurement,
        unit: Unit,
    ) -> f32 {
        if pulse.saturated {
            self.max_range(unit)
        } else {
            self.distance_for_echo(pulse.elapsed_us(), unit)
        }
    }

    /// Fire the trigger and time the echo pulse.
    pub async fn measure_pulse<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
    ) -> Result<PulseMeasurement, B::Error> {
        board.digital_write(pins.trigger, PinState::High)?;
        board.sleep_ms(TRIGGER_PULSE_MS).await;
        board.digital_write(pins.trigger, PinState::Low)?;

        let timeout = self.cal.timeout_us;
        let armed = board.now_micros();
        let mut start = armed;
        while board.digital_read(pins.echo)? == PinState::Low {
            start = board.now_micros();
            if start.saturating_sub(armed) >= timeout {
                tracing::debug!("no echo edge within timeout");
                return Ok(PulseMeasurement {
                    start_us: start,
                    end_us: start + timeout,
                    saturated: true,
                });
            }
        }

        let mut end = start;
        let mut saturated = false;
        while board.digital_read(pins.echo)? == PinState::High {
            end = board.now_micros();
            if end.saturating_sub(start) >= timeout {
                saturated = true;
                break;
            }
        }
        if saturated {
            tracing::debug!(elapsed_us = end - start, "echo pulse saturated");
        }

        Ok(PulseMeasurement {
            start_us: start,
            end_us: end,
            saturated,
        })
    }

    /// Measure the distance to the nearest obstacle in `unit`.
    pub async fn measure<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        unit: Unit,
    ) -> Result<f32, B::Error> {
        let pulse = self.measure_pulse(board, pins).await?;
        Ok(self.distance(&pulse, unit))
    }

    /// Whether an obstacle was detected at most `distance` away. A saturated
    /// echo means nothing is in range, so it is never closer than anything.
    pub async fn is_closer_than<B: Board>(
        &self,
        board: &mut B,
        pins: &PinMap,
        distance: f32,
        unit: Unit,
    ) -> Result<bool, B::Error> {
        let pulse = self.measure_pulse(board, pins).await?;
        Ok(!pulse.saturated && self.distance(&pulse, unit) <= distance)
    }
}
