// Single-axis PID controller
//
// The controller never reads the clock: each call receives `now` and the
// instance keeps only the previous timestamp.
//
// Two behaviours are deliberate and must stay as they are:
// - the integral is a raw sum of errors (not scaled by dt), so its time scale
//   follows the call cadence
// - the derivative term is `dt * kd`, not a rate of change of the error

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ControlError, Result};

/// Proportional, integral and derivative gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite() {
            Ok(())
        } else {
            Err(ControlError::InvalidGains {
                kp: self.kp,
                ki: self.ki,
                kd: self.kd,
            })
        }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

/// Output saturation bounds; `None` leaves that side unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidOutputLimits {
    pub pos_max: Option<f32>,
    pub neg_max: Option<f32>,
}

impl PidOutputLimits {
    pub fn new(pos_max: f32, neg_max: f32) -> Result<Self> {
        let limits = Self {
            pos_max: Some(pos_max),
            neg_max: Some(neg_max),
        };
        limits.validate()?;
        Ok(limits)
    }

    /// `[-limit, limit]`
    pub fn symmetric(limit: f32) -> Result<Self> {
        Self::new(limit, -limit)
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = || ControlError::InvalidOutputLimits {
            neg_max: self.neg_max,
            pos_max: self.pos_max,
        };

        if self.pos_max.is_some_and(f32::is_nan) || self.neg_max.is_some_and(f32::is_nan) {
            return Err(invalid());
        }
        if let (Some(pos), Some(neg)) = (self.pos_max, self.neg_max) {
            if neg > pos {
                return Err(invalid());
            }
        }
        Ok(())
    }

    fn clamp(&self, value: f32) -> f32 {
        let value = self.pos_max.map_or(value, |max| value.min(max));
        self.neg_max.map_or(value, |min| value.max(min))
    }
}

/// Snapshot of one `run_control` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidOutputs {
    pub pid_output: f32,
    /// Seconds since the previous call (or construction/reset)
    pub dt: f32,
    pub error: f32,
    pub integral_error: f32,
    pub target_value: f32,
    pub measured_value: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Output was clipped to the output limits
    pub output_saturated: bool,
    /// Integral accumulator was clipped to the integral limit
    pub integral_saturated: bool,
}

/// Stateful PID controller for one control axis
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    integral_error: f32,
    integral_error_limit: Option<f32>,
    output_limits: PidOutputLimits,
    time_last: Duration,
}

impl PidController {
    /// Create an unbounded controller whose time base starts at `now`
    pub fn new(gains: PidGains, now: Duration) -> Result<Self> {
        Self::with_output_limits(gains, PidOutputLimits::unbounded(), now)
    }

    /// Create a controller with output saturation limits
    pub fn with_output_limits(
        gains: PidGains,
        output_limits: PidOutputLimits,
        now: Duration,
    ) -> Result<Self> {
        gains.validate()?;
        output_limits.validate()?;

        Ok(Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            integral_error: 0.0,
            integral_error_limit: None,
            output_limits,
            time_last: now,
        })
    }

    pub fn set_gains(&mut self, gains: PidGains) -> Result<()> {
        gains.validate()?;
        self.kp = gains.kp;
        self.ki = gains.ki;
        self.kd = gains.kd;
        Ok(())
    }

    pub fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    pub fn set_output_limits(&mut self, limits: PidOutputLimits) -> Result<()> {
        limits.validate()?;
        self.output_limits = limits;
        Ok(())
    }

    pub fn output_limits(&self) -> PidOutputLimits {
        self.output_limits
    }

    /// Bound the magnitude of the integral accumulator
    pub fn set_integral_error_limit(&mut self, limit: f32) -> Result<()> {
        if limit.is_nan() || limit < 0.0 {
            return Err(ControlError::InvalidIntegralLimit(limit));
        }
        self.integral_error_limit = Some(limit);
        Ok(())
    }

    pub fn clear_integral_error_limit(&mut self) {
        self.integral_error_limit = None;
    }

    pub fn integral_error_limit(&self) -> Option<f32> {
        self.integral_error_limit
    }

    pub fn integral_error(&self) -> f32 {
        self.integral_error
    }

    /// Drop the accumulated integral and restart the time base at `now`
    pub fn reset(&mut self, now: Duration) {
        self.integral_error = 0.0;
        self.time_last = now;
    }

    /// Run one control step
    ///
    /// # Errors
    /// `NonMonotonicClock` if `now` is earlier than the previous call; the
    /// controller state is left untouched in that case.
    pub fn run_control(&mut self, target: f32, measured: f32, now: Duration) -> Result<PidOutputs> {
        let elapsed = now
            .checked_sub(self.time_last)
            .ok_or(ControlError::NonMonotonicClock {
                now,
                previous: self.time_last,
            })?;
        let dt = elapsed.as_secs_f32();
        self.time_last = now;

        let error = target - measured;

        // Anti-windup
        let accumulated = self.integral_error + error;
        self.integral_error = match self.integral_error_limit {
            Some(limit) => accumulated.clamp(-limit, limit),
            None => accumulated,
        };
        let integral_saturated = self.integral_error != accumulated;

        let p = error * self.kp;
        let i = self.integral_error * self.ki;
        let d = dt * self.kd;

        let raw_output = p + i + d;
        let output = self.output_limits.clamp(raw_output);

        debug!(
            dt,
            error,
            integral_error = self.integral_error,
            p,
            i,
            d,
            output,
            "pid step"
        );

        Ok(PidOutputs {
            pid_output: output,
            dt,
            error,
            integral_error: self.integral_error,
            target_value: target,
            measured_value: measured,
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            output_saturated: output != raw_output,
            integral_saturated,
        })
    }
}
