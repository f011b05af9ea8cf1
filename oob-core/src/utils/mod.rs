//! Utility re-exports and helper macros for the robot core.
//!
//! - `controllers`: board boundary, drivetrain, sensors, LED and the
//!   `RobotContext` control loop
//! - `math`: open-loop kinematics and calibration
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod controllers;
pub mod math;

pub use controllers::{RobotConfig, RobotContext, SystemCommand, COMMAND_CHANNEL};
pub use math::kinematics::{Calibration, Unit};

#[doc(hidden)]
pub use static_cell;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: $crate::utils::static_cell::StaticCell<$t> =
            $crate::utils::static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
