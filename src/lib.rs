// Closed-loop motion control for a four-wheel skid-steered base
//
// `control` is the pure computational core (kinematics, acceleration
// limiting, PID, motion controller). `runtime` hosts it in a fixed-rate
// loop over zenoh.

pub mod config;
pub mod control;
pub mod messages;
pub mod runtime;
