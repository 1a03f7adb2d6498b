use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skid_motion_runtime::config::{load_controller_config, CMD_TIMEOUT, LOOP_HZ};
use skid_motion_runtime::runtime::{self, RuntimeOptions};

/// Closed-loop motion controller runtime for a skid-steer base
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON controller configuration (defaults are used for missing fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control loop frequency (1-1000 Hz)
    #[arg(long, default_value_t = LOOP_HZ, value_parser = clap::value_parser!(u64).range(1..=1000))]
    loop_hz: u64,

    /// Command watchdog timeout in milliseconds
    #[arg(long, default_value_t = CMD_TIMEOUT.as_millis() as u64)]
    cmd_timeout_ms: u64,
}


#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let mut options = RuntimeOptions {
        loop_hz: args.loop_hz,
        cmd_timeout: Duration::from_millis(args.cmd_timeout_ms),
        ..Default::default()
    };
    if let Some(path) = &args.config {
        match load_controller_config(path) {
            Ok(config) => {
                info!("Loaded controller config from {}", path.display());
                options.controller = config;
            }
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
