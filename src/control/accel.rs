// Acceleration limiting between a measured and a target velocity

use super::error::{ControlError, Result};
use super::types::{AccelerationLimits, RobotVelocities};

fn clamp_magnitude(value: f32, limit: Option<f32>) -> f32 {
    match limit {
        Some(limit) => value.clamp(-limit, limit),
        None => value,
    }
}

/// Step from `measured` toward `target` without exceeding the acceleration limits
///
/// Linear and angular components are limited independently. Only the rate of
/// approach is bounded: the result is one explicit Euler step from the
/// measured velocity, and may still exceed any absolute velocity bound.
///
/// # Errors
/// `NonPositiveTimeStep` when `dt` is not a finite, strictly positive number
/// of seconds. `InvalidAccelerationLimit` for a negative or NaN limit.
pub fn limit_acceleration(
    target: &RobotVelocities,
    measured: &RobotVelocities,
    limits: &AccelerationLimits,
    dt: f32,
) -> Result<RobotVelocities> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(ControlError::NonPositiveTimeStep(dt));
    }
    limits.validate()?;

    let linear_acceleration = (target.linear_velocity - measured.linear_velocity) / dt;
    let angular_acceleration = (target.angular_velocity - measured.angular_velocity) / dt;

    let linear_acceleration = clamp_magnitude(linear_acceleration, limits.linear);
    let angular_acceleration = clamp_magnitude(angular_acceleration, limits.angular);

    Ok(RobotVelocities {
        linear_velocity: measured.linear_velocity + linear_acceleration * dt,
        angular_velocity: measured.angular_velocity + angular_acceleration * dt,
    })
}
