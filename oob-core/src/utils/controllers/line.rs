//! Two-sensor line follower.
//!
//! Each control tick samples both under-chassis sensors once (`true` = dark
//! line seen) and [`LineFollower::decide`] maps the reading and the current
//! state to a single [`FollowerAction`]:
//!
//! | left  | right | action                                                   |
//! |-------|-------|----------------------------------------------------------|
//! | false | false | drive straight at the cruise speed                       |
//! | false | true  | left wheel forward at the correction speed until the right sensor clears |
//! | true  | false | right wheel forward at the correction speed until the left sensor clears |
//! | true  | true  | stop and leave following mode                            |
//!
//! A correction is a state rather than a blocking wait, so it is re-checked
//! every tick, bounded by `correction_timeout_ms`, and ends as soon as
//! following is switched off.

use serde::{Deserialize, Serialize};

use super::drive::Side;

/// Tuning of the line follower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// Straight-line speed (%).
    pub cruise_speed: f32,
    /// Single-wheel correction speed (%).
    pub correction_speed: f32,
    /// Longest a correction may wait for its sensor to clear.
    pub correction_timeout_ms: u32,
    /// Consecutive both-clear readings after which the line counts as lost.
    /// `None` keeps cruising on both-clear indefinitely.
    pub lost_after: Option<u16>,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            cruise_speed: 50.0,
            correction_speed: 30.0,
            correction_timeout_ms: 2000,
            lost_after: None,
        }
    }
}

/// Both sensor samples of one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSensorState {
    pub left: bool,
    pub right: bool,
}

/// Why following ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Both sensors saw the line (wide line or intersection).
    BothSensorsSet,
    /// Both sensors stayed clear for `lost_after` ticks.
    LineLost,
    /// A correction did not reacquire the line in time.
    CorrectionTimeout,
}

/// Command issued to the drivetrain for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerAction {
    /// Following is off; nothing to do.
    Idle,
    /// Both wheels forward at the cruise speed.
    DriveStraight,
    /// Only `wheel` forward at the correction speed.
    Correct { wheel: Side },
    /// A correction is in progress; keep the current command.
    Hold,
    /// Stop the drivetrain and leave following mode.
    Halt(HaltReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowerState {
    Idle,
    Cruising { clear_streak: u16 },
    Correcting { watch: Side, since_us: u64 },
}

pub struct LineFollower {
    config: FollowerConfig,
    state: FollowerState,
}

impl LineFollower {
    pub fn new(config: FollowerConfig) -> Self {
        Self {
            config,
            state: FollowerState::Idle,
        }
    }

    pub fn config(&self) -> &FollowerConfig {
        &self.config
    }

    pub fn set_config(
        &mut self,
        config: FollowerConfig,
    ) {
        self.config = config;
    }

    pub fn is_following(&self) -> bool {
        self.state != FollowerState::Idle
    }

    /// Enter following mode. Calling it while already following changes nothing.
    pub fn start(&mut self) {
        if self.state == FollowerState::Idle {
            self.state = FollowerState::Cruising { clear_streak: 0 };
        }
    }

    /// Leave following mode.
    pub fn cancel(&mut self) {
        self.state = FollowerState::Idle;
    }

    /// Advance the state machine with one sensor sample taken at `now_us`.
    pub fn decide(
        &mut self,
        reading: LineSensorState,
        now_us: u64,
    ) -> FollowerAction {
        let action = match (self.state, reading.left, reading.right) {
            (FollowerState::Idle, _, _) => return FollowerAction::Idle,
            (_, true, true) => FollowerAction::Halt(HaltReason::BothSensorsSet),
            (FollowerState::Correcting { watch, since_us }, _, _) => {
                let still_on = match watch {
                    Side::Left => reading.left,
                    Side::Right => reading.right,
                };
                if !still_on {
                    self.state = FollowerState::Cruising { clear_streak: 0 };
                    FollowerAction::DriveStraight
                } else if now_us.saturating_sub(since_us)
                    >= self.config.correction_timeout_ms as u64 * 1000
                {
                    FollowerAction::Halt(HaltReason::CorrectionTimeout)
                } else {
                    FollowerAction::Hold
                }
            }
            (FollowerState::Cruising { clear_streak }, false, false) => {
                let clear_streak = clear_streak.saturating_add(1);
                match self.config.lost_after {
                    Some(limit) if clear_streak >= limit => {
                        FollowerAction::Halt(HaltReason::LineLost)
                    }
                    _ => {
                        self.state = FollowerState::Cruising { clear_streak };
                        FollowerAction::DriveStraight
                    }
                }
            }
            (FollowerState::Cruising { .. }, left, _) => {
                // the sensor that sees the line is watched; the opposite wheel pushes back
                let watch = if left { Side::Left } else { Side::Right };
                self.state = FollowerState::Correcting {
                    watch,
                    since_us: now_us,
                };
                FollowerAction::Correct {
                    wheel: watch.opposite(),
                }
            }
        };
        if let FollowerAction::Halt(reason) = action {
            tracing::info!(?reason, "line following halted");
            self.state = FollowerState::Idle;
        }
        action
    }
}
