// Timeouts, topics, controller configuration loading
use std::path::Path;
use std::time::Duration;

use crate::control::{ControlError, MotionControllerConfig};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Wheel state older than this is not used for control
pub const WHEEL_STATE_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "skid/cmd/base"; // velocity commands
pub const TOPIC_WHEEL_STATE: &str = "skid/state/wheels"; // measured rpm + applied duty
pub const TOPIC_RT_DUTY: &str = "skid/rt/duty"; // duty commands
pub const TOPIC_HEALTH: &str = "skid/state/health"; // health status
pub const TOPIC_PID: &str = "skid/state/pid"; // per-side PID diagnostics

/// Error types for loading controller configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid controller configuration: {0}")]
    Invalid(#[from] ControlError),
}

/// Parse a JSON controller configuration
///
/// Missing fields take their defaults.
pub fn parse_controller_config(json: &str) -> Result<MotionControllerConfig, serde_json::Error> {
    serde_json::from_str(json)
}

/// Load a JSON controller configuration from disk
pub fn load_controller_config(path: &Path) -> Result<MotionControllerConfig, ConfigError> {
    let display = path.display().to_string();
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    let config = parse_controller_config(&json).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })?;
    config.validate()?;
    Ok(config)
}
