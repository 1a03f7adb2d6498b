// Value types shared by the control core and the runtime messages
//
// Wheel speeds and wheel duty cycles have the same shape but different
// units, so they get different types. Converting between them goes through
// kinematics and the motion controller's duty scaling.

use serde::{Deserialize, Serialize};

use super::error::{ControlError, Result};

/// Static geometry of the skid-steer base (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotGeometry {
    /// Distance between the left and right wheel contact lines
    pub wheel_base: f32,
    /// Distance between the front and rear axles
    pub intra_axle_distance: f32,
    pub wheel_radius: f32,
}

impl RobotGeometry {
    /// Create a geometry, rejecting non-positive or non-finite dimensions
    pub fn new(wheel_base: f32, intra_axle_distance: f32, wheel_radius: f32) -> Result<Self> {
        let geometry = Self {
            wheel_base,
            intra_axle_distance,
            wheel_radius,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("wheel_base", self.wheel_base),
            ("intra_axle_distance", self.intra_axle_distance),
            ("wheel_radius", self.wheel_radius),
        ];
        for (name, value) in dims {
            if !value.is_finite() || value <= 0.0 {
                return Err(ControlError::InvalidGeometry {
                    reason: format!("{} must be finite and > 0, got {}", name, value),
                });
            }
        }
        Ok(())
    }
}

impl Default for RobotGeometry {
    fn default() -> Self {
        Self {
            wheel_base: 0.5,
            intra_axle_distance: 0.3,
            wheel_radius: 0.05,
        }
    }
}

/// Measured wheel speeds in revolutions per minute
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelRpm {
    pub fl: f32,
    pub fr: f32,
    pub rl: f32,
    pub rr: f32,
}

impl WheelRpm {
    pub fn new(fl: f32, fr: f32, rl: f32, rr: f32) -> Self {
        Self { fl, fr, rl, rr }
    }

    /// Same speed on every wheel
    pub fn uniform(rpm: f32) -> Self {
        Self::new(rpm, rpm, rpm, rpm)
    }

    /// Returns speeds as array [fl, fr, rl, rr]
    pub fn as_array(&self) -> [f32; 4] {
        [self.fl, self.fr, self.rl, self.rr]
    }
}

/// Commanded wheel duty cycles in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelDuty {
    pub fl: f32,
    pub fr: f32,
    pub rl: f32,
    pub rr: f32,
}

impl WheelDuty {
    pub fn new(fl: f32, fr: f32, rl: f32, rr: f32) -> Self {
        Self { fl, fr, rl, rr }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Front and rear wheels of a side get the same duty
    pub fn from_sides(left: f32, right: f32) -> Self {
        Self::new(left, right, left, right)
    }

    /// Returns duty cycles as array [fl, fr, rl, rr]
    pub fn as_array(&self) -> [f32; 4] {
        [self.fl, self.fr, self.rl, self.rr]
    }

    /// Apply `f` to every wheel
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.fl), f(self.fr), f(self.rl), f(self.rr))
    }

    /// Combine two duty sets wheel by wheel
    pub fn zip_with(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self::new(
            f(self.fl, other.fl),
            f(self.fr, other.fr),
            f(self.rl, other.rl),
            f(self.rr, other.rr),
        )
    }
}

/// Per-side surface travel rate (m/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideRates {
    pub left: f32,
    pub right: f32,
}

/// Robot-frame velocities
///
/// * `linear_velocity` - forward velocity in m/s
/// * `angular_velocity` - yaw rate in rad/s (positive = counter-clockwise)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotVelocities {
    pub linear_velocity: f32,
    pub angular_velocity: f32,
}

impl RobotVelocities {
    pub fn new(linear_velocity: f32, angular_velocity: f32) -> Self {
        Self {
            linear_velocity,
            angular_velocity,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Acceleration magnitude limits; `None` means unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelerationLimits {
    /// m/s^2
    pub linear: Option<f32>,
    /// rad/s^2
    pub angular: Option<f32>,
}

impl AccelerationLimits {
    pub fn new(linear: f32, angular: f32) -> Result<Self> {
        let limits = Self {
            linear: Some(linear),
            angular: Some(angular),
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        for limit in [self.linear, self.angular].into_iter().flatten() {
            if limit.is_nan() || limit < 0.0 {
                return Err(ControlError::InvalidAccelerationLimit(limit));
            }
        }
        Ok(())
    }
}
