// Motion controller for the skid-steer base
//
// One call to `run_motion_control` is one control cycle:
//   wheel RPM -> measured body velocity
//   target + measured -> acceleration-limited target
//   limited target -> per-side travel rates -> feed-forward duty
//   (closed loop) + traction gain * per-side PID correction
//   low-pass filter against the current duty, clamp to the duty ceiling

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::accel::limit_acceleration;
use super::error::{ControlError, Result};
use super::kinematics::{
    compute_side_rates_from_velocities, compute_velocities_from_wheelspeeds,
    side_rates_from_wheelspeeds, travel_rate_to_rpm,
};
use super::pid::{PidController, PidGains, PidOutputLimits, PidOutputs};
use super::types::{AccelerationLimits, RobotGeometry, RobotVelocities, SideRates, WheelDuty, WheelRpm};

/// How wheel commands are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Commands come straight from inverse kinematics
    #[default]
    OpenLoop,
    /// Inverse kinematics plus per-side PID correction against measured speed
    ClosedLoop,
}

/// Full controller configuration, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionControllerConfig {
    pub operating_mode: OperatingMode,
    pub robot_geometry: RobotGeometry,
    pub pid_gains: PidGains,
    /// Duty ceiling in percent, applied symmetrically
    pub max_motor_duty: f32,
    /// Wheel speed (RPM) reached at `max_motor_duty`
    pub max_wheel_rpm: f32,
    pub traction_control_gain: f32,
    /// Weight of the new command against the current one, in (0, 1]
    pub lpf_alpha: f32,
    pub acceleration_limits: AccelerationLimits,
    pub integral_error_limit: Option<f32>,
}

impl Default for MotionControllerConfig {
    fn default() -> Self {
        Self {
            operating_mode: OperatingMode::OpenLoop,
            robot_geometry: RobotGeometry::default(),
            pid_gains: PidGains::default(),
            max_motor_duty: 100.0,
            max_wheel_rpm: 200.0,
            traction_control_gain: 1.0,
            lpf_alpha: 1.0,
            acceleration_limits: AccelerationLimits::unbounded(),
            integral_error_limit: None,
        }
    }
}

fn check_duty_ceiling(max_motor_duty: f32) -> Result<()> {
    if max_motor_duty.is_finite() && max_motor_duty > 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidDutyCeiling(max_motor_duty))
    }
}

fn check_max_wheel_rpm(max_wheel_rpm: f32) -> Result<()> {
    if max_wheel_rpm.is_finite() && max_wheel_rpm > 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidMaxWheelRpm(max_wheel_rpm))
    }
}

fn check_filter_alpha(alpha: f32) -> Result<()> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidFilterAlpha(alpha))
    }
}

fn check_traction_gain(gain: f32) -> Result<()> {
    if gain.is_finite() && gain >= 0.0 {
        Ok(())
    } else {
        Err(ControlError::InvalidTractionGain(gain))
    }
}

fn check_integral_limit(limit: Option<f32>) -> Result<()> {
    match limit {
        Some(l) if l.is_nan() || l < 0.0 => Err(ControlError::InvalidIntegralLimit(l)),
        _ => Ok(()),
    }
}

impl MotionControllerConfig {
    pub fn validate(&self) -> Result<()> {
        self.robot_geometry.validate()?;
        self.pid_gains.validate()?;
        check_duty_ceiling(self.max_motor_duty)?;
        check_max_wheel_rpm(self.max_wheel_rpm)?;
        check_traction_gain(self.traction_control_gain)?;
        check_filter_alpha(self.lpf_alpha)?;
        self.acceleration_limits.validate()?;
        check_integral_limit(self.integral_error_limit)
    }
}

/// Per-side PID snapshots from the most recent closed-loop cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideDiagnostics {
    pub left: PidOutputs,
    pub right: PidOutputs,
}

#[derive(Debug)]
struct ClosedLoopState {
    left: PidController,
    right: PidController,
}

impl ClosedLoopState {
    fn controllers_mut(&mut self) -> [&mut PidController; 2] {
        [&mut self.left, &mut self.right]
    }
}

/// PID state only exists while running closed loop
#[derive(Debug)]
enum ControlMode {
    Open,
    Closed(ClosedLoopState),
}

/// Orchestrates kinematics, acceleration limiting and PID for one base
#[derive(Debug)]
pub struct SkidRobotMotionController {
    mode: ControlMode,
    robot_geometry: RobotGeometry,
    pid_gains: PidGains,
    max_motor_duty: f32,
    max_wheel_rpm: f32,
    traction_control_gain: f32,
    lpf_alpha: f32,
    acceleration_limits: AccelerationLimits,
    integral_error_limit: Option<f32>,
    last_cycle: Duration,
    latest_diagnostics: Option<SideDiagnostics>,
}

impl SkidRobotMotionController {
    /// Create a controller whose first cycle measures dt from `now`
    pub fn new(config: MotionControllerConfig, now: Duration) -> Result<Self> {
        config.validate()?;

        let mut controller = Self {
            mode: ControlMode::Open,
            robot_geometry: config.robot_geometry,
            pid_gains: config.pid_gains,
            max_motor_duty: config.max_motor_duty,
            max_wheel_rpm: config.max_wheel_rpm,
            traction_control_gain: config.traction_control_gain,
            lpf_alpha: config.lpf_alpha,
            acceleration_limits: config.acceleration_limits,
            integral_error_limit: config.integral_error_limit,
            last_cycle: now,
            latest_diagnostics: None,
        };
        if config.operating_mode == OperatingMode::ClosedLoop {
            controller.mode = ControlMode::Closed(controller.build_closed_loop(now)?);
        }
        Ok(controller)
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> MotionControllerConfig {
        MotionControllerConfig {
            operating_mode: self.operating_mode(),
            robot_geometry: self.robot_geometry,
            pid_gains: self.pid_gains,
            max_motor_duty: self.max_motor_duty,
            max_wheel_rpm: self.max_wheel_rpm,
            traction_control_gain: self.traction_control_gain,
            lpf_alpha: self.lpf_alpha,
            acceleration_limits: self.acceleration_limits,
            integral_error_limit: self.integral_error_limit,
        }
    }

    fn build_pid(&self, now: Duration) -> Result<PidController> {
        let limits = PidOutputLimits::symmetric(self.max_motor_duty)?;
        let mut pid = PidController::with_output_limits(self.pid_gains, limits, now)?;
        if let Some(limit) = self.integral_error_limit {
            pid.set_integral_error_limit(limit)?;
        }
        Ok(pid)
    }

    fn build_closed_loop(&self, now: Duration) -> Result<ClosedLoopState> {
        Ok(ClosedLoopState {
            left: self.build_pid(now)?,
            right: self.build_pid(now)?,
        })
    }

    /// Switch operating mode
    ///
    /// Entering closed loop always starts from fresh PID state timed from
    /// `now`. Re-selecting the current mode changes nothing.
    pub fn set_operating_mode(&mut self, mode: OperatingMode, now: Duration) -> Result<()> {
        if mode == self.operating_mode() {
            return Ok(());
        }

        self.mode = match mode {
            OperatingMode::OpenLoop => ControlMode::Open,
            OperatingMode::ClosedLoop => ControlMode::Closed(self.build_closed_loop(now)?),
        };
        self.latest_diagnostics = None;
        info!("Operating mode set to {:?}", mode);
        Ok(())
    }

    pub fn operating_mode(&self) -> OperatingMode {
        match self.mode {
            ControlMode::Open => OperatingMode::OpenLoop,
            ControlMode::Closed(_) => OperatingMode::ClosedLoop,
        }
    }

    pub fn set_robot_geometry(&mut self, geometry: RobotGeometry) -> Result<()> {
        geometry.validate()?;
        self.robot_geometry = geometry;
        Ok(())
    }

    pub fn robot_geometry(&self) -> RobotGeometry {
        self.robot_geometry
    }

    /// Set gains for both sides; live PID state is kept
    pub fn set_pid_gains(&mut self, gains: PidGains) -> Result<()> {
        gains.validate()?;
        if let ControlMode::Closed(state) = &mut self.mode {
            for pid in state.controllers_mut() {
                pid.set_gains(gains)?;
            }
        }
        self.pid_gains = gains;
        Ok(())
    }

    pub fn pid_gains(&self) -> PidGains {
        self.pid_gains
    }

    /// Scale applied to the PID correction before it is added to the feed-forward duty
    ///
    /// The same gain applies to both sides. It does not detect slip, so it
    /// cannot de-weight one slipping side on its own; 0 disables the closed-loop
    /// correction and 1 applies it in full.
    pub fn set_traction_gain(&mut self, gain: f32) -> Result<()> {
        check_traction_gain(gain)?;
        self.traction_control_gain = gain;
        Ok(())
    }

    pub fn traction_gain(&self) -> f32 {
        self.traction_control_gain
    }

    pub fn set_motor_max_duty(&mut self, max_motor_duty: f32) -> Result<()> {
        check_duty_ceiling(max_motor_duty)?;
        if let ControlMode::Closed(state) = &mut self.mode {
            let limits = PidOutputLimits::symmetric(max_motor_duty)?;
            for pid in state.controllers_mut() {
                pid.set_output_limits(limits)?;
            }
        }
        self.max_motor_duty = max_motor_duty;
        Ok(())
    }

    pub fn motor_max_duty(&self) -> f32 {
        self.max_motor_duty
    }

    pub fn set_max_wheel_rpm(&mut self, max_wheel_rpm: f32) -> Result<()> {
        check_max_wheel_rpm(max_wheel_rpm)?;
        self.max_wheel_rpm = max_wheel_rpm;
        Ok(())
    }

    pub fn max_wheel_rpm(&self) -> f32 {
        self.max_wheel_rpm
    }

    pub fn set_filter_alpha(&mut self, alpha: f32) -> Result<()> {
        check_filter_alpha(alpha)?;
        self.lpf_alpha = alpha;
        Ok(())
    }

    pub fn filter_alpha(&self) -> f32 {
        self.lpf_alpha
    }

    pub fn set_acceleration_limits(&mut self, limits: AccelerationLimits) -> Result<()> {
        limits.validate()?;
        self.acceleration_limits = limits;
        Ok(())
    }

    pub fn acceleration_limits(&self) -> AccelerationLimits {
        self.acceleration_limits
    }

    /// Bound both PID integral accumulators; `None` removes the bound
    pub fn set_integral_error_limit(&mut self, limit: Option<f32>) -> Result<()> {
        check_integral_limit(limit)?;
        if let ControlMode::Closed(state) = &mut self.mode {
            for pid in state.controllers_mut() {
                match limit {
                    Some(l) => pid.set_integral_error_limit(l)?,
                    None => pid.clear_integral_error_limit(),
                }
            }
        }
        self.integral_error_limit = limit;
        Ok(())
    }

    pub fn integral_error_limit(&self) -> Option<f32> {
        self.integral_error_limit
    }

    /// Restart the time base at `now` after a gap in control cycles
    ///
    /// The next cycle measures dt from `now`, closed-loop PID state starts
    /// fresh, and the previous diagnostics are dropped.
    pub fn reset(&mut self, now: Duration) {
        self.last_cycle = now;
        if let ControlMode::Closed(state) = &mut self.mode {
            for pid in state.controllers_mut() {
                pid.reset(now);
            }
        }
        self.latest_diagnostics = None;
        debug!("Motion controller reset at {:?}", now);
    }

    /// PID snapshots from the last closed-loop cycle
    pub fn latest_diagnostics(&self) -> Option<SideDiagnostics> {
        self.latest_diagnostics
    }

    /// Map a side travel rate (m/s) to a duty cycle (percent)
    fn rate_to_duty(&self, rate: f32) -> f32 {
        travel_rate_to_rpm(rate, &self.robot_geometry) / self.max_wheel_rpm * self.max_motor_duty
    }

    /// Run one control cycle
    ///
    /// # Arguments
    /// * `velocity_targets` - Desired body velocity
    /// * `current_duty_cycles` - Duty currently applied by the motor driver (percent)
    /// * `current_motor_speeds` - Measured wheel speeds (RPM)
    /// * `now` - Timestamp of this cycle
    ///
    /// # Errors
    /// `NonMonotonicClock` if `now` is before the previous cycle,
    /// `NonPositiveTimeStep` if it equals it. A failed cycle changes no state.
    pub fn run_motion_control(
        &mut self,
        velocity_targets: &RobotVelocities,
        current_duty_cycles: &WheelDuty,
        current_motor_speeds: &WheelRpm,
        now: Duration,
    ) -> Result<WheelDuty> {
        let geometry = self.robot_geometry;
        let measured = compute_velocities_from_wheelspeeds(current_motor_speeds, &geometry);

        let elapsed = now
            .checked_sub(self.last_cycle)
            .ok_or(ControlError::NonMonotonicClock {
                now,
                previous: self.last_cycle,
            })?;
        let dt = elapsed.as_secs_f32();
        let limited = limit_acceleration(velocity_targets, &measured, &self.acceleration_limits, dt)?;

        let target_rates = compute_side_rates_from_velocities(&limited, &geometry);
        let feed_forward = SideRates {
            left: self.rate_to_duty(target_rates.left),
            right: self.rate_to_duty(target_rates.right),
        };

        let traction_gain = self.traction_control_gain;
        let (side_duty, diagnostics) = match &mut self.mode {
            ControlMode::Open => (feed_forward, None),
            ControlMode::Closed(state) => {
                let measured_rates = side_rates_from_wheelspeeds(current_motor_speeds, &geometry);
                let left = state
                    .left
                    .run_control(target_rates.left, measured_rates.left, now)?;
                let right = state
                    .right
                    .run_control(target_rates.right, measured_rates.right, now)?;

                let corrected = SideRates {
                    left: feed_forward.left + traction_gain * left.pid_output,
                    right: feed_forward.right + traction_gain * right.pid_output,
                };
                (corrected, Some(SideDiagnostics { left, right }))
            }
        };

        let alpha = self.lpf_alpha;
        let max_duty = self.max_motor_duty;
        let command = WheelDuty::from_sides(side_duty.left, side_duty.right)
            .zip_with(*current_duty_cycles, |new, current| {
                alpha * new + (1.0 - alpha) * current
            })
            .map(|duty| duty.clamp(-max_duty, max_duty));

        debug!(
            dt,
            measured_linear = measured.linear_velocity,
            measured_angular = measured.angular_velocity,
            limited_linear = limited.linear_velocity,
            limited_angular = limited.angular_velocity,
            "motion cycle -> {:?}",
            command.as_array()
        );

        self.last_cycle = now;
        self.latest_diagnostics = diagnostics;
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::clock::{Clock, ManualClock};

    const CYCLE: Duration = Duration::from_millis(20);

    fn duty_for_rate(rate: f32) -> f32 {
        let g = RobotGeometry::default();
        travel_rate_to_rpm(rate, &g) / 200.0 * 100.0
    }

    fn assert_close(actual: f32, expected: f32, what: &str) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "{}: {} != {}",
            what,
            actual,
            expected
        );
    }

    fn controller(config: MotionControllerConfig, clock: &ManualClock) -> SkidRobotMotionController {
        SkidRobotMotionController::new(config, clock.now()).unwrap()
    }

    fn closed_loop_config(kp: f32, ki: f32) -> MotionControllerConfig {
        MotionControllerConfig {
            operating_mode: OperatingMode::ClosedLoop,
            pid_gains: PidGains::new(kp, ki, 0.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_open_loop_straight_line() {
        let clock = ManualClock::new();
        let mut mc = controller(MotionControllerConfig::default(), &clock);

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(0.5, 0.0),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();

        let expected = duty_for_rate(0.5);
        for d in duty.as_array() {
            assert_close(d, expected, "wheel duty");
        }
        assert!(mc.latest_diagnostics().is_none(), "Open loop has no PID diagnostics");
    }

    #[test]
    fn test_open_loop_turn_direction() {
        let clock = ManualClock::new();
        let mut mc = controller(MotionControllerConfig::default(), &clock);

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(0.2, 0.5),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();

        assert!(duty.fr > duty.fl, "Positive yaw should drive the right side faster");
        assert_eq!(duty.fl, duty.rl);
        assert_eq!(duty.fr, duty.rr);
    }

    #[test]
    fn test_acceleration_is_limited() {
        let clock = ManualClock::new();
        let config = MotionControllerConfig {
            acceleration_limits: AccelerationLimits::new(1.0, 1.0).unwrap(),
            ..Default::default()
        };
        let mut mc = controller(config, &clock);

        clock.advance(Duration::from_millis(100));
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(2.0, 0.0),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();

        // 1 m/s^2 for 0.1 s from standstill
        assert_close(duty.fl, duty_for_rate(0.1), "limited duty");
    }

    #[test]
    fn test_duty_ceiling_clamps_every_wheel() {
        let clock = ManualClock::new();
        let mut mc = controller(MotionControllerConfig::default(), &clock);

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(-5.0, 0.0),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();
        assert_eq!(duty.as_array(), [-100.0; 4]);

        mc.set_motor_max_duty(30.0).unwrap();
        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(0.0, 20.0),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();
        assert_eq!(duty.as_array(), [-30.0, 30.0, -30.0, 30.0]);
    }

    #[test]
    fn test_low_pass_filter_blends_with_current_duty() {
        let clock = ManualClock::new();
        let config = MotionControllerConfig {
            lpf_alpha: 0.25,
            ..Default::default()
        };
        let mut mc = controller(config, &clock);

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(0.5, 0.0),
                &WheelDuty::new(40.0, 40.0, 0.0, 0.0),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();

        let fresh = duty_for_rate(0.5);
        assert_close(duty.fl, 0.25 * fresh + 0.75 * 40.0, "front-left");
        assert_close(duty.rl, 0.25 * fresh, "rear-left");
    }

    #[test]
    fn test_closed_loop_adds_pid_correction() {
        let clock = ManualClock::new();
        let mut config = closed_loop_config(10.0, 0.0);
        config.traction_control_gain = 0.5;
        let mut mc = controller(config, &clock);

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(0.5, 0.0),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();

        // error 0.5 m/s on each side, kp 10, traction gain 0.5
        assert_close(duty.fl, duty_for_rate(0.5) + 2.5, "left duty");
        assert_close(duty.fr, duty_for_rate(0.5) + 2.5, "right duty");

        let diag = mc.latest_diagnostics().expect("closed loop diagnostics");
        assert_close(diag.left.error, 0.5, "left error");
        assert_close(diag.right.pid_output, 5.0, "right output");
        assert_close(diag.left.dt, 0.02, "dt");
    }

    #[test]
    fn test_closed_loop_at_target_matches_feed_forward() {
        let clock = ManualClock::new();
        let mut mc = controller(closed_loop_config(10.0, 0.0), &clock);
        let g = RobotGeometry::default();
        let rpm = travel_rate_to_rpm(0.3, &g);

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(
                &RobotVelocities::new(0.3, 0.0),
                &WheelDuty::zero(),
                &WheelRpm::uniform(rpm),
                clock.now(),
            )
            .unwrap();

        for d in duty.as_array() {
            assert_close(d, duty_for_rate(0.3), "steady state duty");
        }
    }

    #[test]
    fn test_pid_output_limited_by_duty_ceiling() {
        let clock = ManualClock::new();
        let mut mc = controller(closed_loop_config(1000.0, 0.0), &clock);
        mc.set_motor_max_duty(10.0).unwrap();

        clock.advance(CYCLE);
        mc.run_motion_control(
            &RobotVelocities::new(0.5, 0.0),
            &WheelDuty::zero(),
            &WheelRpm::default(),
            clock.now(),
        )
        .unwrap();

        let diag = mc.latest_diagnostics().unwrap();
        assert_eq!(diag.left.pid_output, 10.0);
        assert!(diag.left.output_saturated);
    }

    #[test]
    fn test_reentering_closed_loop_starts_fresh() {
        let clock = ManualClock::new();
        let mut mc = controller(closed_loop_config(0.0, 1.0), &clock);
        let target = RobotVelocities::new(0.5, 0.0);

        for _ in 0..5 {
            clock.advance(CYCLE);
            mc.run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now())
                .unwrap();
        }
        assert_close(mc.latest_diagnostics().unwrap().left.integral_error, 2.5, "wound up");

        // Re-selecting the same mode keeps the accumulator
        mc.set_operating_mode(OperatingMode::ClosedLoop, clock.now()).unwrap();
        clock.advance(CYCLE);
        mc.run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now())
            .unwrap();
        assert_close(mc.latest_diagnostics().unwrap().left.integral_error, 3.0, "kept");

        mc.set_operating_mode(OperatingMode::OpenLoop, clock.now()).unwrap();
        assert_eq!(mc.operating_mode(), OperatingMode::OpenLoop);
        assert!(mc.latest_diagnostics().is_none());

        mc.set_operating_mode(OperatingMode::ClosedLoop, clock.now()).unwrap();
        clock.advance(CYCLE);
        mc.run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now())
            .unwrap();
        let diag = mc.latest_diagnostics().unwrap();
        assert_close(diag.left.integral_error, 0.5, "fresh integral");
        assert_close(diag.left.dt, 0.02, "fresh time base");
    }

    #[test]
    fn test_integral_limit_propagates() {
        let clock = ManualClock::new();
        let mut mc = controller(closed_loop_config(0.0, 1.0), &clock);
        mc.set_integral_error_limit(Some(1.0)).unwrap();

        for _ in 0..5 {
            clock.advance(CYCLE);
            mc.run_motion_control(
                &RobotVelocities::new(0.5, 0.0),
                &WheelDuty::zero(),
                &WheelRpm::default(),
                clock.now(),
            )
            .unwrap();
        }
        let diag = mc.latest_diagnostics().unwrap();
        assert_eq!(diag.left.integral_error, 1.0);
        assert!(diag.left.integral_saturated);
    }

    #[test]
    fn test_degenerate_timing_rejected() {
        let clock = ManualClock::starting_at(Duration::from_secs(1));
        let mut mc = controller(closed_loop_config(1.0, 1.0), &clock);
        let target = RobotVelocities::new(0.5, 0.0);

        let same_instant =
            mc.run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now());
        assert!(matches!(same_instant, Err(ControlError::NonPositiveTimeStep(_))));

        let earlier = mc.run_motion_control(
            &target,
            &WheelDuty::zero(),
            &WheelRpm::default(),
            Duration::from_millis(500),
        );
        assert!(matches!(earlier, Err(ControlError::NonMonotonicClock { .. })));
        assert!(mc.latest_diagnostics().is_none());

        clock.advance(CYCLE);
        mc.run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now())
            .unwrap();
        let diag = mc.latest_diagnostics().unwrap();
        assert_close(diag.left.integral_error, 0.5, "failed cycles left no trace");
    }

    #[test]
    fn test_reset_restarts_time_base_after_gap() {
        let clock = ManualClock::new();
        let config = MotionControllerConfig {
            acceleration_limits: AccelerationLimits::new(1.0, 1.0).unwrap(),
            ..closed_loop_config(0.0, 1.0)
        };
        let mut mc = controller(config, &clock);
        let target = RobotVelocities::new(2.0, 0.0);

        clock.advance(CYCLE);
        mc.run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now())
            .unwrap();
        assert!(mc.latest_diagnostics().is_some());

        // Long pause, then reset at the moment control resumes
        clock.advance(Duration::from_secs(3));
        mc.reset(clock.now());
        assert!(mc.latest_diagnostics().is_none());

        clock.advance(CYCLE);
        let duty = mc
            .run_motion_control(&target, &WheelDuty::zero(), &WheelRpm::default(), clock.now())
            .unwrap();

        // 1 m/s^2 for one 20 ms cycle from standstill, plus the fresh integral term
        let diag = mc.latest_diagnostics().unwrap();
        assert_close(diag.left.dt, 0.02, "dt after reset");
        assert_close(diag.left.integral_error, 0.02, "integral after reset");
        assert_close(duty.fl, duty_for_rate(0.02) + 0.02, "limited duty after reset");
    }

    #[test]
    fn test_setters_reject_invalid_values() {
        let clock = ManualClock::new();
        let mut mc = controller(MotionControllerConfig::default(), &clock);

        assert!(mc.set_robot_geometry(RobotGeometry { wheel_base: 0.0, ..Default::default() }).is_err());
        assert_eq!(mc.set_motor_max_duty(0.0), Err(ControlError::InvalidDutyCeiling(0.0)));
        assert_eq!(mc.set_max_wheel_rpm(-1.0), Err(ControlError::InvalidMaxWheelRpm(-1.0)));
        assert_eq!(mc.set_filter_alpha(0.0), Err(ControlError::InvalidFilterAlpha(0.0)));
        assert!(mc.set_filter_alpha(1.5).is_err());
        assert_eq!(mc.set_traction_gain(-0.1), Err(ControlError::InvalidTractionGain(-0.1)));
        assert!(mc.set_pid_gains(PidGains::new(f32::NAN, 0.0, 0.0)).is_err());
        assert!(mc.set_integral_error_limit(Some(-2.0)).is_err());
        assert!(mc.set_acceleration_limits(AccelerationLimits { linear: Some(-1.0), angular: None }).is_err());

        assert_eq!(mc.config(), MotionControllerConfig::default(), "Rejected values must not stick");
    }

    #[test]
    fn test_setters_and_getters() {
        let clock = ManualClock::new();
        let mut mc = controller(MotionControllerConfig::default(), &clock);

        let geometry = RobotGeometry::new(0.6, 0.4, 0.08).unwrap();
        mc.set_robot_geometry(geometry).unwrap();
        mc.set_pid_gains(PidGains::new(2.0, 0.1, 0.0)).unwrap();
        mc.set_traction_gain(0.8).unwrap();
        mc.set_motor_max_duty(90.0).unwrap();
        mc.set_max_wheel_rpm(150.0).unwrap();
        mc.set_filter_alpha(0.6).unwrap();
        mc.set_acceleration_limits(AccelerationLimits::new(0.5, 1.0).unwrap())
            .unwrap();
        mc.set_integral_error_limit(Some(4.0)).unwrap();

        assert_eq!(mc.robot_geometry(), geometry);
        assert_eq!(mc.pid_gains(), PidGains::new(2.0, 0.1, 0.0));
        assert_eq!(mc.traction_gain(), 0.8);
        assert_eq!(mc.motor_max_duty(), 90.0);
        assert_eq!(mc.max_wheel_rpm(), 150.0);
        assert_eq!(mc.filter_alpha(), 0.6);
        assert_eq!(mc.acceleration_limits().linear, Some(0.5));
        assert_eq!(mc.integral_error_limit(), Some(4.0));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: MotionControllerConfig = serde_json::from_str(
            r#"{
                "operating_mode": "closed_loop",
                "max_motor_duty": 80.0,
                "acceleration_limits": { "linear": 1.5, "angular": null }
            }"#,
        )
        .unwrap();

        assert_eq!(config.operating_mode, OperatingMode::ClosedLoop);
        assert_eq!(config.max_motor_duty, 80.0);
        assert_eq!(config.acceleration_limits.linear, Some(1.5));
        assert_eq!(config.acceleration_limits.angular, None);
        assert_eq!(config.robot_geometry, RobotGeometry::default());

        let mc = SkidRobotMotionController::new(config, Duration::ZERO).unwrap();
        assert_eq!(mc.operating_mode(), OperatingMode::ClosedLoop);
    }
}
