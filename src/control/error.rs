// Error types for the control core
//
// Every variant is a local precondition violation reported to the immediate
// caller. Saturation is never an error; it shows up in `PidOutputs` instead.

/// Error types for configuration and control-cycle preconditions
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("Invalid robot geometry: {reason}")]
    InvalidGeometry { reason: String },

    #[error("Invalid PID gains: kp={kp}, ki={ki}, kd={kd} (must be finite)")]
    InvalidGains { kp: f32, ki: f32, kd: f32 },

    #[error("Invalid PID output limits: neg_max={neg_max:?}, pos_max={pos_max:?}")]
    InvalidOutputLimits {
        neg_max: Option<f32>,
        pos_max: Option<f32>,
    },

    #[error("Invalid integral error limit: {0} (must be >= 0)")]
    InvalidIntegralLimit(f32),

    #[error("Invalid acceleration limit: {0} (must be >= 0)")]
    InvalidAccelerationLimit(f32),

    #[error("Invalid motor duty ceiling: {0} (must be > 0)")]
    InvalidDutyCeiling(f32),

    #[error("Invalid max wheel RPM: {0} (must be > 0)")]
    InvalidMaxWheelRpm(f32),

    #[error("Invalid low-pass filter alpha: {0} (must be in (0, 1])")]
    InvalidFilterAlpha(f32),

    #[error("Invalid traction control gain: {0} (must be >= 0)")]
    InvalidTractionGain(f32),

    #[error("Non-positive time step: dt={0}s")]
    NonPositiveTimeStep(f32),

    #[error("Clock went backwards: now={now:?} is before previous {previous:?}")]
    NonMonotonicClock {
        now: std::time::Duration,
        previous: std::time::Duration,
    },
}

pub type Result<T> = std::result::Result<T, ControlError>;
