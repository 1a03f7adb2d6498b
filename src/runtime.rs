// Fixed-rate control loop with watchdogs
// Note: two watchdogs guard the loop
// - command watchdog: no recent velocity command -> target zero velocity (still acceleration limited)
// - wheel state watchdog: no recent measurements -> zero duty, controller is not run
// Control restarts its time base when measurements come back, so the first cycle
// after a gap is acceleration limited over one tick, not over the whole gap.

use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_BASE, TOPIC_HEALTH, TOPIC_PID, TOPIC_RT_DUTY,
    TOPIC_WHEEL_STATE, WHEEL_STATE_TIMEOUT,
};
use crate::control::{
    Clock, MonotonicClock, MotionControllerConfig, RobotVelocities, SideDiagnostics,
    SkidRobotMotionController, WheelDuty,
};
use crate::messages::{RuntimeHealth, VelocityCommand, WheelState};

/// Loop settings for `run`
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub loop_hz: u64,
    pub cmd_timeout: Duration,
    pub wheel_state_timeout: Duration,
    pub controller: MotionControllerConfig,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            cmd_timeout: CMD_TIMEOUT,
            wheel_state_timeout: WHEEL_STATE_TIMEOUT,
            controller: MotionControllerConfig::default(),
        }
    }
}

pub struct Runtime<C: Clock> {
    controller: SkidRobotMotionController,
    clock: C,
    latest_cmd: Option<VelocityCommand>,
    cmd_received_at: Duration,
    wheel_state: Option<WheelState>,
    wheel_state_received_at: Duration,
    cmd_timeout: Duration,
    wheel_state_timeout: Duration,
    health: RuntimeHealth,
}

impl<C: Clock> Runtime<C> {
    pub fn new(
        controller: SkidRobotMotionController,
        clock: C,
        cmd_timeout: Duration,
        wheel_state_timeout: Duration,
    ) -> Self {
        let now = clock.now();
        Self {
            controller,
            clock,
            latest_cmd: None,
            cmd_received_at: now,
            wheel_state: None,
            wheel_state_received_at: now,
            cmd_timeout,
            wheel_state_timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn diagnostics(&self) -> Option<SideDiagnostics> {
        self.controller.latest_diagnostics()
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: VelocityCommand) {
        info!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = self.clock.now();
    }

    fn wheel_state_fresh(&self, now: Duration) -> bool {
        self.wheel_state.is_some()
            && now.saturating_sub(self.wheel_state_received_at) <= self.wheel_state_timeout
    }

    /// Process incoming wheel state report
    fn on_wheel_state(&mut self, state: WheelState) {
        let now = self.clock.now();
        if !self.wheel_state_fresh(now) {
            info!("Wheel state available, restarting control at {:?}", now);
            self.controller.reset(now);
        }
        self.wheel_state = Some(state);
        self.wheel_state_received_at = now;
    }

    fn set_health(&mut self, health: RuntimeHealth) {
        if health != self.health && health != RuntimeHealth::Ok {
            warn!("Runtime health {:?} -> {:?}", self.health, health);
        }
        self.health = health;
    }

    /// Compute duty commands based on watchdog state
    fn compute_actuation(&mut self) -> WheelDuty {
        let now = self.clock.now();

        let wheel_state = match self.wheel_state {
            Some(state) if self.wheel_state_fresh(now) => state,
            _ => {
                // Watchdog triggered - no fresh measurements, stop the robot
                self.set_health(RuntimeHealth::NoWheelState);
                return WheelDuty::zero();
            }
        };

        let (target, health) = match self.latest_cmd {
            Some(ref cmd) if now.saturating_sub(self.cmd_received_at) <= self.cmd_timeout => {
                (RobotVelocities::from(cmd), RuntimeHealth::Ok)
            }
            // Stale or never received: bring the robot to rest
            _ => (RobotVelocities::zero(), RuntimeHealth::CmdStale),
        };

        match self
            .controller
            .run_motion_control(&target, &wheel_state.duty, &wheel_state.speeds_rpm, now)
        {
            Ok(duty) => {
                self.set_health(health);
                duty
            }
            Err(e) => {
                warn!("Control cycle rejected: {}", e);
                self.set_health(RuntimeHealth::ControlFault);
                WheelDuty::zero()
            }
        }
    }
}

/// Tick period for a loop frequency; `None` for 0 Hz
pub fn loop_period(loop_hz: u64) -> Option<Duration> {
    (loop_hz > 0).then(|| Duration::from_secs_f64(1.0 / loop_hz as f64))
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let period = loop_period(options.loop_hz).ok_or("loop frequency must be > 0 Hz")?;
    let clock = MonotonicClock::new();
    let controller = SkidRobotMotionController::new(options.controller.clone(), clock.now())?;
    info!(
        "Motion controller ready: {:?} mode, {}% duty ceiling",
        controller.operating_mode(),
        controller.motor_max_duty()
    );

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(TOPIC_CMD_BASE).await?;
    let sub_wheels = session.declare_subscriber(TOPIC_WHEEL_STATE).await?;
    let pub_duty = session.declare_publisher(TOPIC_RT_DUTY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    let pub_pid = session.declare_publisher(TOPIC_PID).await?;

    let mut runtime = Runtime::new(
        controller,
        clock,
        options.cmd_timeout,
        options.wheel_state_timeout,
    );
    let mut tick = interval(period);

    info!(
        "Runtime started: {}Hz loop, {}ms command watchdog, {}ms wheel state watchdog",
        options.loop_hz,
        options.cmd_timeout.as_millis(),
        options.wheel_state_timeout.as_millis()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_BASE, TOPIC_WHEEL_STATE);
    info!("Publishing to: {}, {}, {}", TOPIC_RT_DUTY, TOPIC_HEALTH, TOPIC_PID);

    loop {
        tick.tick().await;

        // 1. Drain all pending messages (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<VelocityCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }
        while let Ok(Some(sample)) = sub_wheels.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<WheelState>(&payload) {
                Ok(state) => runtime.on_wheel_state(state),
                Err(e) => warn!("Failed to parse wheel state: {}", e),
            }
        }

        // 2. Run the controller (includes watchdog logic)
        let duty = runtime.compute_actuation();

        // 3. Publish duty commands
        pub_duty.put(serde_json::to_string(&duty)?).await?;

        // 4. Publish health and diagnostics
        pub_health.put(serde_json::to_string(&runtime.health())?).await?;
        if let Some(diag) = runtime.diagnostics() {
            pub_pid.put(serde_json::to_string(&diag)?).await?;
        }
    }
}
