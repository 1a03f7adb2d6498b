// Motion control core for the skid-steer base
//
// Provides:
// - Skid-steer forward/inverse kinematics (wheel RPM <-> body velocity)
// - Acceleration limiting between measured and target velocities
// - Single-axis PID controller with anti-windup
// - Motion controller orchestrating one control cycle
//
// Nothing in here reads the wall clock or touches I/O: time comes in as an
// explicit `now` argument (see `clock`).

pub mod accel;
pub mod clock;
mod error;
pub mod kinematics;
pub mod motion;
pub mod pid;
pub mod types;

pub use accel::limit_acceleration;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{ControlError, Result};
pub use kinematics::{
    compute_side_rates_from_velocities, compute_velocities_from_wheelspeeds, RPM_TO_RADS_SEC,
};
pub use motion::{MotionControllerConfig, OperatingMode, SideDiagnostics, SkidRobotMotionController};
pub use pid::{PidController, PidGains, PidOutputLimits, PidOutputs};
pub use types::{AccelerationLimits, RobotGeometry, RobotVelocities, SideRates, WheelDuty, WheelRpm};
