//! Recording fake board with a virtual microsecond clock.
#![allow(dead_code)]

use std::{collections::HashMap, convert::Infallible};

use embedded_hal::digital::PinState;
use oob_core::utils::controllers::{Board, Pin, PinMap};

/// Virtual time consumed by every digital read (µs).
pub const POLL_US: u64 = 4;
/// Delay between the trigger falling edge and the echo rising edge (µs).
pub const ECHO_DELAY_US: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Write {
    Digital(PinState),
    Servo(f32),
    Analog(u16),
}

pub struct FakeBoard {
    pins: PinMap,
    now: u64,
    digital: HashMap<Pin, PinState>,
    servo: HashMap<Pin, f32>,
    analog: HashMap<Pin, u16>,
    pub history: Vec<(Pin, Write)>,
    pub configured: Vec<(Pin, u16, bool)>,
    pub slept: Vec<u32>,
    pub line_left: bool,
    pub line_right: bool,
    echo_width: Option<u64>,
    echo_window: Option<(u64, u64)>,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self::with_pins(PinMap::default())
    }

    pub fn with_pins(pins: PinMap) -> Self {
        Self {
            pins,
            now: 1_000,
            digital: HashMap::new(),
            servo: HashMap::new(),
            analog: HashMap::new(),
            history: Vec::new(),
            configured: Vec::new(),
            slept: Vec::new(),
            line_left: false,
            line_right: false,
            echo_width: None,
            echo_window: None,
        }
    }

    /// Answer every trigger with an echo pulse `width_us` wide.
    pub fn with_echo(width_us: u64) -> Self {
        let mut board = Self::new();
        board.echo_width = Some(width_us);
        board
    }

    pub fn set_line(
        &mut self,
        left: bool,
        right: bool,
    ) {
        self.line_left = left;
        self.line_right = right;
    }

    pub fn advance(
        &mut self,
        us: u64,
    ) {
        self.now += us;
    }

    pub fn analog(
        &self,
        pin: Pin,
    ) -> u16 {
        self.analog.get(&pin).copied().unwrap_or(0)
    }

    pub fn servo(
        &self,
        pin: Pin,
    ) -> Option<f32> {
        self.servo.get(&pin).copied()
    }

    pub fn digital(
        &self,
        pin: Pin,
    ) -> PinState {
        self.digital.get(&pin).copied().unwrap_or(PinState::Low)
    }

    pub fn write_count(&self) -> usize {
        self.history.len()
    }
}

impl Board for FakeBoard {
    type Error = Infallible;

    fn digital_write(
        &mut self,
        pin: Pin,
        level: PinState,
    ) -> Result<(), Self::Error> {
        if pin == self.pins.trigger && level == PinState::Low {
            if let Some(width) = self.echo_width {
                let rise = self.now + ECHO_DELAY_US;
                self.echo_window = Some((rise, rise + width));
            }
        }
        self.digital.insert(pin, level);
        self.history.push((pin, Write::Digital(level)));
        Ok(())
    }

    fn digital_read(
        &mut self,
        pin: Pin,
    ) -> Result<PinState, Self::Error> {
        let high = if pin == self.pins.echo {
            matches!(self.echo_window, Some((rise, fall)) if self.now >= rise && self.now < fall)
        } else if pin == self.pins.line_left {
            self.line_left
        } else if pin == self.pins.line_right {
            self.line_right
        } else {
            self.digital(pin) == PinState::High
        };
        self.now += POLL_US;
        Ok(PinState::from(high))
    }

    fn servo_write(
        &mut self,
        pin: Pin,
        value: f32,
    ) -> Result<(), Self::Error> {
        self.servo.insert(pin, value);
        self.history.push((pin, Write::Servo(value)));
        Ok(())
    }

    fn servo_configure(
        &mut self,
        pin: Pin,
        pulse_width_us: u16,
        continuous: bool,
    ) -> Result<(), Self::Error> {
        self.configured.push((pin, pulse_width_us, continuous));
        Ok(())
    }

    fn analog_write(
        &mut self,
        pin: Pin,
        duty: u16,
    ) -> Result<(), Self::Error> {
        self.analog.insert(pin, duty);
        self.history.push((pin, Write::Analog(duty)));
        Ok(())
    }

    fn now_micros(&mut self) -> u64 {
        self.now
    }

    async fn sleep_ms(
        &mut self,
        ms: u32,
    ) {
        self.slept.push(ms);
        self.now += ms as u64 * 1000;
    }
}
