// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::control::{RobotVelocities, WheelDuty, WheelRpm};

// Command from teleop/planner -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear_velocity: f32,  // m/s
    pub angular_velocity: f32, // rad/s, positive = counter-clockwise
}

impl From<&VelocityCommand> for RobotVelocities {
    fn from(cmd: &VelocityCommand) -> Self {
        Self::new(cmd.linear_velocity, cmd.angular_velocity)
    }
}

// Report from motor driver -> runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WheelState {
    pub speeds_rpm: WheelRpm,
    pub duty: WheelDuty,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    NoWheelState,
    ControlFault,
}
