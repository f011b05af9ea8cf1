//! Simulated board: logs every actuator write and fakes the ultrasonic echo
//! and line sensors.
//!
//! The simulator keeps the pin map it was built with, so it follows the
//! robot's startup configuration but not later `pins` commands.

use std::{collections::HashMap, convert::Infallible, time::Instant};

use embassy_time::Timer;
use embedded_hal::digital::PinState;
use oob_core::utils::controllers::{Board, Pin, PinMap};
use tracing::{debug, info};

/// Delay between the trigger falling edge and the echo rising edge (µs).
const ECHO_LATENCY_US: u64 = 200;

pub struct SimBoard {
    pins: PinMap,
    origin: Instant,
    obstacle_cm: Option<f32>,
    cm_per_us: f32,
    echo_window: Option<(u64, u64)>,
    line_left: bool,
    line_right: bool,
    outputs: HashMap<Pin, PinState>,
}

impl SimBoard {
    pub fn new(
        pins: PinMap,
        cm_per_us: f32,
        obstacle_cm: Option<f32>,
        line_left: bool,
        line_right: bool,
    ) -> Self {
        Self {
            pins,
            origin: Instant::now(),
            obstacle_cm,
            cm_per_us,
            echo_window: None,
            line_left,
            line_right,
            outputs: HashMap::new(),
        }
    }

    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

impl Board for SimBoard {
    type Error = Infallible;

    fn digital_write(
        &mut self,
        pin: Pin,
        level: PinState,
    ) -> Result<(), Self::Error> {
        if pin == self.pins.trigger {
            if level == PinState::Low {
                self.echo_window = self.obstacle_cm.map(|cm| {
                    let rise = self.micros() + ECHO_LATENCY_US;
                    (rise, rise + (cm / self.cm_per_us) as u64)
                });
            }
            debug!(pin, ?level, "trigger");
        } else {
            info!(pin, ?level, "digital write");
        }
        self.outputs.insert(pin, level);
        Ok(())
    }

    fn digital_read(
        &mut self,
        pin: Pin,
    ) -> Result<PinState, Self::Error> {
        let now = self.micros();
        let high = if pin == self.pins.echo {
            matches!(self.echo_window, Some((rise, fall)) if now >= rise && now < fall)
        } else if pin == self.pins.line_left {
            self.line_left
        } else if pin == self.pins.line_right {
            self.line_right
        } else {
            self.outputs.get(&pin) == Some(&PinState::High)
        };
        Ok(PinState::from(high))
    }

    fn servo_write(
        &mut self,
        pin: Pin,
        value: f32,
    ) -> Result<(), Self::Error> {
        info!(pin, value, "servo write");
        Ok(())
    }

    fn servo_configure(
        &mut self,
        pin: Pin,
        pulse_width_us: u16,
        continuous: bool,
    ) -> Result<(), Self::Error> {
        info!(pin, pulse_width_us, continuous, "servo configured");
        Ok(())
    }

    fn analog_write(
        &mut self,
        pin: Pin,
        duty: u16,
    ) -> Result<(), Self::Error> {
        info!(pin, duty, "analog write");
        Ok(())
    }

    fn now_micros(&mut self) -> u64 {
        self.micros()
    }

    async fn sleep_ms(
        &mut self,
        ms: u32,
    ) {
        Timer::after_millis(ms as u64).await;
    }
}
