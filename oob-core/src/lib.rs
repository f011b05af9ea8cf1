//! Motion and sensing core for a two-wheeled differential-drive robot on
//! no-std embedded platforms.
//!
//! For a runnable simulation, see the `oob-app/mock-mcu` binary.
#![cfg_attr(not(test), no_std)]

pub mod utils;
