//! meter2mqtt - Main Entry Point
//!
//! Reads meter values from a serial digitizer device and republishes them as
//! retained MQTT messages; control messages flow the other way.

use clap::Parser;
use meter2mqtt::config::ConfigOverrides;
use meter2mqtt::{gateway, logging};
use std::path::PathBuf;
use std::process;
use tracing::Level;

/// Gateway between a serial metering device and an MQTT broker
#[derive(Parser)]
#[command(name = "meter2mqtt")]
#[command(about = "Gateway between a serial metering device and an MQTT broker")]
#[command(version)]
struct Cli {
    /// Serial device path
    #[arg(short, long, value_name = "PATH")]
    device: Option<String>,

    /// Topic prefix for readings and control messages
    #[arg(short = 't', long, value_name = "TOPIC")]
    device_topic: Option<String>,

    /// Per-sensor topic segment template
    #[arg(short = 's', long, value_name = "TEMPLATE")]
    sensor_topic: Option<String>,

    /// Additional configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let fallback = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    logging::init_default_logging(fallback);

    tracing::info!("Starting meter2mqtt v{}", env!("CARGO_PKG_VERSION"));

    let overrides = ConfigOverrides {
        device: cli.device,
        device_topic: cli.device_topic,
        sensor_topic: cli.sensor_topic,
        config: cli.config,
    };

    if let Err(e) = gateway::run(&overrides).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
