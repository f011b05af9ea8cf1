//! LED control module for the robot.
//!
//! Drives the single indicator LED pin, either at a steady level or blinking
//! with a configurable half-period advanced by the control loop's tick.

use embedded_hal::digital::PinState;
use serde::{Deserialize, Serialize};

use super::board::{Board, Pin};

/// LED command variants for steady levels and blinking.
///
/// Serialized as JSON with tag `"lc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "lc", rename_all = "snake_case")]
pub enum LEDCommand {
    /// Drive the LED high (cancels blinking).
    On,
    /// Drive the LED low (cancels blinking).
    Off,
    /// Toggle the LED every `period_ms` milliseconds.
    Blink { period_ms: u32 },
    /// Stop blinking and switch the LED off.
    StopBlink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedMode {
    Steady,
    Blink { period_us: u64, next_toggle_us: u64 },
}

/// Indicator LED with an optional blink schedule.
pub struct LedModule {
    mode: LedMode,
    lit: bool,
}

impl Default for LedModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LedModule {
    /// The LED starts steady and off.
    pub fn new() -> Self {
        Self {
            mode: LedMode::Steady,
            lit: false,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self.mode, LedMode::Blink { .. })
    }

    /// Execute an incoming `LEDCommand` against the LED on `pin`.
    pub fn ex_command<B: Board>(
        &mut self,
        board: &mut B,
        pin: Pin,
        cmd: LEDCommand,
    ) -> Result<(), B::Error> {
        match cmd {
            LEDCommand::On => self.set_level(board, pin, PinState::High),
            LEDCommand::Off | LEDCommand::StopBlink => self.set_level(board, pin, PinState::Low),
            LEDCommand::Blink { period_ms } => {
                let now = board.now_micros();
                let period_us = period_ms.max(1) as u64 * 1000;
                self.mode = LedMode::Blink {
                    period_us,
                    next_toggle_us: now + period_us,
                };
                self.write(board, pin, true)
            }
        }
    }

    /// Hold the LED at `level`, cancelling any blink.
    pub fn set_level<B: Board>(
        &mut self,
        board: &mut B,
        pin: Pin,
        level: PinState,
    ) -> Result<(), B::Error> {
        self.mode = LedMode::Steady;
        self.write(board, pin, level == PinState::High)
    }

    /// Move the LED from `old` to `new`: the old pin is switched off and the
    /// current level (and blink schedule) carries over to the new one.
    pub fn relocate<B: Board>(
        &mut self,
        board: &mut B,
        old: Pin,
        new: Pin,
    ) -> Result<(), B::Error> {
        board.digital_write(old, PinState::Low)?;
        self.write(board, new, self.lit)
    }

    /// Toggle the LED if a blink half-period has elapsed.
    pub fn tick<B: Board>(
        &mut self,
        board: &mut B,
        pin: Pin,
    ) -> Result<(), B::Error> {
        if let LedMode::Blink {
            period_us,
            next_toggle_us,
        } = self.mode
        {
            let now = board.now_micros();
            if now >= next_toggle_us {
                self.mode = LedMode::Blink {
                    period_us,
                    next_toggle_us: now + period_us,
                };
                self.write(board, pin, !self.lit)?;
            }
        }
        Ok(())
    }

    fn write<B: Board>(
        &mut self,
        board: &mut B,
        pin: Pin,
        lit: bool,
    ) -> Result<(), B::Error> {
        board.digital_write(pin, PinState::from(lit))?;
        self.lit = lit;
        Ok(())
    }
}
