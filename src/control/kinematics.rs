// Skid-steer kinematics for the four-wheel base
// Converts measured wheel speeds (RPM) to body-frame velocities, and desired
// body-frame velocities back to per-side travel rates and wheel speeds.

use std::f32::consts::PI;

use super::types::{RobotGeometry, RobotVelocities, SideRates, WheelRpm};

/// Revolutions per minute to radians per second
pub const RPM_TO_RADS_SEC: f32 = 2.0 * PI / 60.0;

/// Combine two rates, trusting the slower one
///
/// Same sign: the smaller magnitude wins. Opposite signs (or a zero): 0.
/// A wheel that slips spins faster than its axle-mate, so the slower value
/// is the safer estimate of actual ground travel.
fn conservative(a: f32, b: f32) -> f32 {
    if a * b <= 0.0 {
        0.0
    } else if a.abs() < b.abs() {
        a
    } else {
        b
    }
}

/// Circumference of the circle traced by the wheels when turning in place (meters)
pub fn stance_circumference(geometry: &RobotGeometry) -> f32 {
    let rs = (0.5 * geometry.wheel_base).hypot(0.5 * geometry.intra_axle_distance);
    2.0 * PI * rs
}

/// Convert a wheel speed (RPM) into surface travel rate (m/s)
pub fn rpm_to_travel_rate(rpm: f32, geometry: &RobotGeometry) -> f32 {
    rpm * RPM_TO_RADS_SEC * geometry.wheel_radius
}

/// Convert a surface travel rate (m/s) into wheel speed (RPM)
pub fn travel_rate_to_rpm(rate: f32, geometry: &RobotGeometry) -> f32 {
    rate / (RPM_TO_RADS_SEC * geometry.wheel_radius)
}

/// Estimate per-side travel rates from measured wheel speeds
pub fn side_rates_from_wheelspeeds(wheel_speeds: &WheelRpm, geometry: &RobotGeometry) -> SideRates {
    SideRates {
        left: rpm_to_travel_rate(conservative(wheel_speeds.fl, wheel_speeds.rl), geometry),
        right: rpm_to_travel_rate(conservative(wheel_speeds.fr, wheel_speeds.rr), geometry),
    }
}

/// Convert measured wheel speeds to body-frame velocities
///
/// # Arguments
/// * `wheel_speeds` - Measured wheel speeds in RPM
/// * `geometry` - Validated robot geometry (all dimensions > 0)
///
/// # Returns
/// Linear velocity (m/s) capped by the slower side, and angular velocity
/// (rad/s, positive when the right side travels faster than the left)
pub fn compute_velocities_from_wheelspeeds(
    wheel_speeds: &WheelRpm,
    geometry: &RobotGeometry,
) -> RobotVelocities {
    let rates = side_rates_from_wheelspeeds(wheel_speeds, geometry);
    let travel_differential = rates.right - rates.left;

    RobotVelocities {
        linear_velocity: conservative(rates.left, rates.right),
        angular_velocity: travel_differential / stance_circumference(geometry),
    }
}

/// Convert body-frame velocities to per-side travel rates (m/s)
///
/// Symmetric differential-drive inverse: the angular term is split evenly
/// between the two sides around the linear velocity.
pub fn compute_side_rates_from_velocities(
    velocities: &RobotVelocities,
    geometry: &RobotGeometry,
) -> SideRates {
    let half_differential = 0.5 * velocities.angular_velocity * stance_circumference(geometry);

    SideRates {
        left: velocities.linear_velocity - half_differential,
        right: velocities.linear_velocity + half_differential,
    }
}

/// Per-wheel speeds (RPM) for the given side travel rates
pub fn side_rates_to_wheel_rpm(rates: &SideRates, geometry: &RobotGeometry) -> WheelRpm {
    let left = travel_rate_to_rpm(rates.left, geometry);
    let right = travel_rate_to_rpm(rates.right, geometry);
    WheelRpm::new(left, right, left, right)
}
