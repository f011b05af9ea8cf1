//! Math utilities for the robot.
//!
//! This module provides open-loop timing kinematics and the calibration record
//! for a two-wheeled differential drive.

pub mod kinematics;
