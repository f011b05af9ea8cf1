//! Module Exports
//!
//! This file exports the robot's controllers and ties them together in
//! [`RobotContext`], the single owner of the board and all motion state.
//!
//! - `board`: hardware boundary trait and pin bindings.
//! - `drive`: servo and DC-motor actuation backends.
//! - `motion`: open-loop motion primitives and fault status.
//! - `ultrasonic`: trigger/echo range finder.
//! - `line`: two-sensor line follower state machine.
//! - `leds`: indicator LED with blinking.

pub mod board;
pub mod drive;
pub mod leds;
pub mod line;
pub mod motion;
pub mod ultrasonic;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{with_timeout, Duration};
use embedded_hal::digital::PinState;
use serde::{Deserialize, Serialize};

pub use board::{Board, Pin, PinMap, PinRole, WheelPins};
pub use drive::{ActuationBackend, Backend, Direction, Side};
pub use leds::{LEDCommand, LedModule};
pub use line::{FollowerAction, FollowerConfig, HaltReason, LineFollower, LineSensorState};
pub use motion::{Fault, MotionController, RobotError};
pub use ultrasonic::{PulseMeasurement, RangeFinder};

use crate::utils::math::kinematics::{Calibration, Unit};

/// Channel used to receive commands (`SystemCommand` messages) for the control loop.
pub static COMMAND_CHANNEL: embassy_sync::channel::Channel<
    CriticalSectionRawMutex,
    SystemCommand,
    16,
> = embassy_sync::channel::Channel::new();

/// Motion command variants.
///
/// Serialized as JSON with tag `"mc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "mc", rename_all = "snake_case")]
pub enum MotionCommand {
    /// Drive straight at speed `s` (%).
    Move { d: Direction, s: f32 },
    /// Drive straight for `dist` in `unit`, then stop.
    Distance { d: Direction, dist: f32, unit: Unit },
    /// Spin in place toward `side` at speed `s` (%).
    Rotate { side: Side, s: f32 },
    /// Turn by `a` degrees toward `side`, then stop.
    Angle { side: Side, a: f32 },
    /// Drive only the wheel on `side`.
    Wheel { side: Side, d: Direction, s: f32 },
    Stop,
    /// Start following the line.
    Follow,
    /// Stop following the line and halt.
    Unfollow,
}

/// Sensor query variants.
///
/// Serialized as JSON with tag `"sc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "sc", rename_all = "snake_case")]
pub enum SensorCommand {
    Distance { unit: Unit },
    Closer { dist: f32, unit: Unit },
    Line { side: Side },
    Fault,
}

/// Configuration variants.
///
/// Serialized as JSON with tag `"cc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "cc", rename_all = "snake_case")]
pub enum ConfigCommand {
    Init { backend: Backend },
    Pins(PinRole),
    Calibrate(Calibration),
    Follower(FollowerConfig),
    ClearFault,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "ct", rename_all = "snake_case")] // ct = command type
pub enum SystemCommand {
    M(MotionCommand),
    S(SensorCommand),
    L(LEDCommand),
    C(ConfigCommand),
}

impl SystemCommand {
    /// Decode a JSON command, e.g. `{"ct":"m","mc":"move","d":"forward","s":50}`.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Value produced by a command.
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Reading {
    /// Obstacle distance in the requested unit.
    Distance(f32),
    /// Result of a proximity check.
    Closer(bool),
    /// Line sensor state (`true` = line seen).
    Line(bool),
    /// Open-loop hold time of a distance or angle move (ms).
    HoldMs(u32),
    Fault(Option<Fault>),
}

/// Process-lifetime configuration of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub pins: PinMap,
    pub calibration: Calibration,
    pub follower: FollowerConfig,
    /// Control-loop tick period (ms).
    pub tick_ms: u32,
}

impl RobotConfig {
    /// See [`Calibration::validate`].
    pub fn validate(&self) -> Result<(), &'static str> {
        self.calibration.validate()
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            pins: PinMap::default(),
            calibration: Calibration::default(),
            follower: FollowerConfig::default(),
            tick_ms: 5,
        }
    }
}

/// Owns the board and every piece of robot state.
pub struct RobotContext<B> {
    board: B,
    pins: PinMap,
    motion: MotionController,
    ranger: RangeFinder,
    follower: LineFollower,
    led: LedModule,
    tick_ms: u32,
}

impl<B> RobotContext<B>
where
    B: Board,
{
    pub fn new(
        board: B,
        config: RobotConfig,
    ) -> Self {
        RobotContext {
            board,
            pins: config.pins,
            motion: MotionController::new(config.calibration),
            ranger: RangeFinder::new(config.calibration.range),
            follower: LineFollower::new(config.follower),
            led: LedModule::new(),
            tick_ms: config.tick_ms.max(1),
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn ranger(&self) -> &RangeFinder {
        &self.ranger
    }

    pub fn led(&self) -> &LedModule {
        &self.led
    }

    pub fn fault(&self) -> Option<Fault> {
        self.motion.fault()
    }

    pub fn clear_fault(&mut self) {
        self.motion.clear_fault();
    }

    /// Select the actuation backend.
    pub fn initialize(
        &mut self,
        backend: Backend,
    ) -> Result<(), RobotError<B::Error>> {
        self.motion.select_backend(&mut self.board, &self.pins, backend)
    }

    /// Rebind the pins of one role. An active drivetrain is stopped on its
    /// old pins and reconfigured on the new ones.
    pub fn configure_pins(
        &mut self,
        role: PinRole,
    ) -> Result<(), RobotError<B::Error>> {
        self.motion.stop(&mut self.board, &self.pins)?;
        let old_led = self.pins.led;
        self.pins.assign(role);
        if self.pins.led != old_led {
            self.led
                .relocate(&mut self.board, old_led, self.pins.led)
                .map_err(RobotError::Board)?;
        }
        if let Some(backend) = self.motion.backend() {
            self.motion
                .select_backend(&mut self.board, &self.pins, backend)?;
        }
        Ok(())
    }

    /// Replace the calibration. The active backend is reselected so the new
    /// values apply immediately. A calibration with a zero, negative or
    /// non-finite speed, length or timing constant is rejected unchanged.
    pub fn calibrate(
        &mut self,
        calibration: Calibration,
    ) -> Result<(), RobotError<B::Error>> {
        if let Err(field) = calibration.validate() {
            tracing::warn!(field, "rejected calibration");
            return Err(RobotError::InvalidArgument(field));
        }
        self.motion.set_calibration(calibration);
        self.ranger.set_calibration(calibration.range);
        if let Some(backend) = self.motion.backend() {
            self.motion
                .select_backend(&mut self.board, &self.pins, backend)?;
        }
        Ok(())
    }

    pub fn drive(
        &mut self,
        direction: Direction,
        speed: f32,
    ) -> Result<(), RobotError<B::Error>> {
        self.motion
            .drive(&mut self.board, &self.pins, direction, speed)
    }

    pub async fn drive_distance(
        &mut self,
        direction: Direction,
        distance: f32,
        unit: Unit,
    ) -> Result<u32, RobotError<B::Error>> {
        self.motion
            .drive_distance(&mut self.board, &self.pins, direction, distance, unit)
            .await
    }

    pub fn rotate(
        &mut self,
        side: Side,
        speed: f32,
    ) -> Result<(), RobotError<B::Error>> {
        self.motion.rotate(&mut self.board, &self.pins, side, speed)
    }

    pub async fn rotate_angle(
        &mut self,
        side: Side,
        angle: f32,
    ) -> Result<u32, RobotError<B::Error>> {
        self.motion
            .rotate_angle(&mut self.board, &self.pins, side, angle)
            .await
    }

    pub fn control_wheel(
        &mut self,
        side: Side,
        direction: Direction,
        speed: f32,
    ) -> Result<(), RobotError<B::Error>> {
        self.motion
            .control_wheel(&mut self.board, &self.pins, side, direction, speed)
    }

    pub fn stop(&mut self) -> Result<(), RobotError<B::Error>> {
        self.motion.stop(&mut self.board, &self.pins)
    }

    /// Distance to the nearest obstacle. Readings at `ranger().max_range(unit)`
    /// mean nothing was detected.
    pub async fn measure_distance(
        &mut self,
        unit: Unit,
    ) -> Result<f32, RobotError<B::Error>> {
        self.ranger
            .measure(&mut self.board, &self.pins, unit)
            .await
            .map_err(RobotError::Board)
    }

    pub async fn is_closer_than(
        &mut self,
        distance: f32,
        unit: Unit,
    ) -> Result<bool, RobotError<B::Error>> {
        let distance = motion::clamp_arg::<B::Error>(distance, 0.0, f32::MAX, "distance")?;
        self.ranger
            .is_closer_than(&mut self.board, &self.pins, distance, unit)
            .await
            .map_err(RobotError::Board)
    }

    /// `true` when the sensor on `side` sees the line.
    pub fn line_sensor_state(
        &mut self,
        side: Side,
    ) -> Result<bool, RobotError<B::Error>> {
        let level = self
            .board
            .digital_read(self.pins.line_sensor(side))
            .map_err(RobotError::Board)?;
        Ok(level == PinState::High)
    }

    fn read_line_sensors(&mut self) -> Result<LineSensorState, RobotError<B::Error>> {
        Ok(LineSensorState {
            left: self.line_sensor_state(Side::Left)?,
            right: self.line_sensor_state(Side::Right)?,
        })
    }

    pub fn is_following(&self) -> bool {
        self.follower.is_following()
    }

    pub fn start_line_follow(&mut self) {
        self.follower.start();
    }

    /// Leave following mode and stop the drivetrain immediately.
    pub fn stop_line_follow(&mut self) -> Result<(), RobotError<B::Error>> {
        self.follower.cancel();
        self.stop()
    }

    pub fn set_led_state(
        &mut self,
        level: PinState,
    ) -> Result<(), RobotError<B::Error>> {
        self.led
            .set_level(&mut self.board, self.pins.led, level)
            .map_err(RobotError::Board)
    }

    pub fn blink_led(
        &mut self,
        period_ms: u32,
    ) -> Result<(), RobotError<B::Error>> {
        self.led_command(LEDCommand::Blink { period_ms })
    }

    pub fn stop_led_blink(&mut self) -> Result<(), RobotError<B::Error>> {
        self.led_command(LEDCommand::StopBlink)
    }

    fn led_command(
        &mut self,
        cmd: LEDCommand,
    ) -> Result<(), RobotError<B::Error>> {
        self.led
            .ex_command(&mut self.board, self.pins.led, cmd)
            .map_err(RobotError::Board)
    }

    /// Run one line-follower step and apply its action to the drivetrain.
    pub fn follow_step(&mut self) -> Result<FollowerAction, RobotError<B::Error>> {
        if !self.follower.is_following() {
            return Ok(FollowerAction::Idle);
        }
        let reading = self.read_line_sensors()?;
        let now = self.board.now_micros();
        let action = self.follower.decide(reading, now);
        let cfg = *self.follower.config();
        let applied = match action {
            FollowerAction::Idle | FollowerAction::Hold => Ok(()),
            FollowerAction::DriveStraight => {
                self.motion
                    .drive(&mut self.board, &self.pins, Direction::Forward, cfg.cruise_speed)
            }
            FollowerAction::Correct { wheel } => self.motion.control_wheel(
                &mut self.board,
                &self.pins,
                wheel,
                Direction::Forward,
                cfg.correction_speed,
            ),
            FollowerAction::Halt(_) => self.stop(),
        };
        if let Err(e) = applied {
            self.follower.cancel();
            return Err(e);
        }
        Ok(action)
    }

    /// One pass of the background behaviours: line follower, then LED blink.
    /// Both behaviours run every tick; the first error is reported.
    pub fn tick(&mut self) -> Result<FollowerAction, RobotError<B::Error>> {
        let action = self.follow_step();
        let blink = self
            .led
            .tick(&mut self.board, self.pins.led)
            .map_err(RobotError::Board);
        let action = action?;
        blink?;
        Ok(action)
    }

    /// Execute a `SystemCommand`, returning the reading it produces if any.
    pub async fn execute_command(
        &mut self,
        command: SystemCommand,
    ) -> Result<Option<Reading>, RobotError<B::Error>> {
        match command {
            SystemCommand::M(cmd) => self.execute_motion(cmd).await,
            SystemCommand::S(cmd) => self.execute_sensor(cmd).await,
            SystemCommand::L(cmd) => {
                self.led_command(cmd)?;
                Ok(None)
            }
            SystemCommand::C(cmd) => {
                match cmd {
                    ConfigCommand::Init { backend } => self.initialize(backend)?,
                    ConfigCommand::Pins(role) => self.configure_pins(role)?,
                    ConfigCommand::Calibrate(cal) => self.calibrate(cal)?,
                    ConfigCommand::Follower(cfg) => self.follower.set_config(cfg),
                    ConfigCommand::ClearFault => self.clear_fault(),
                }
                Ok(None)
            }
        }
    }

    async fn execute_motion(
        &mut self,
        cmd: MotionCommand,
    ) -> Result<Option<Reading>, RobotError<B::Error>> {
        match cmd {
            MotionCommand::Move { d, s } => self.drive(d, s)?,
            MotionCommand::Distance { d, dist, unit } => {
                let held = self.drive_distance(d, dist, unit).await?;
                return Ok(Some(Reading::HoldMs(held)));
            }
            MotionCommand::Rotate { side, s } => self.rotate(side, s)?,
            MotionCommand::Angle { side, a } => {
                let held = self.rotate_angle(side, a).await?;
                return Ok(Some(Reading::HoldMs(held)));
            }
            MotionCommand::Wheel { side, d, s } => self.control_wheel(side, d, s)?,
            MotionCommand::Stop => self.stop()?,
            MotionCommand::Follow => self.start_line_follow(),
            MotionCommand::Unfollow => self.stop_line_follow()?,
        }
        Ok(None)
    }

    async fn execute_sensor(
        &mut self,
        cmd: SensorCommand,
    ) -> Result<Option<Reading>, RobotError<B::Error>> {
        let reading = match cmd {
            SensorCommand::Distance { unit } => Reading::Distance(self.measure_distance(unit).await?),
            SensorCommand::Closer { dist, unit } => {
                Reading::Closer(self.is_closer_than(dist, unit).await?)
            }
            SensorCommand::Line { side } => Reading::Line(self.line_sensor_state(side)?),
            SensorCommand::Fault => Reading::Fault(self.fault()),
        };
        Ok(Some(reading))
    }

    /// Control loop: execute commands from `COMMAND_CHANNEL` as they arrive
    /// and tick the background behaviours at least once per tick period.
    pub async fn run(&mut self) -> ! {
        let period = Duration::from_millis(self.tick_ms as u64);
        loop {
            if let Ok(command) = with_timeout(period, COMMAND_CHANNEL.receive()).await {
                tracing::info!("Received Command: {:?}", command);
                match self.execute_command(command).await {
                    Ok(Some(reading)) => tracing::info!(?reading, "command reading"),
                    Ok(None) => tracing::debug!("command executed successfully"),
                    Err(e) => tracing::error!("command failed: {}", e),
                }
            }
            if let Err(e) = self.tick() {
                tracing::error!("control tick failed: {}", e);
            }
        }
    }
}
