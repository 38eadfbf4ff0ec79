use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use vigie::broker::Broker;
use vigie::configuration::config::Config;
use vigie::supervisor::stream_supervisor::StreamSupervisor;

#[derive(Parser)]
#[command(name = "vigie")]
#[command(version = "0.1.0")]
#[command(about = "Camera stream supervisor: reframes an H.264 capture process into published NAL units")]
struct Args {
    config_file: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match Config::from_file(Path::new(args.config_file.as_str())) {
        Ok(config) => config,
        Err(e) => {
            error!("unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    info!("configuration imported successfully");

    let broker = Arc::new(Broker::new(64));
    let (mut supervisor, mode_tx) = StreamSupervisor::new(config, broker);

    // The mode-control handle is the only external control surface; hold it
    // open so the supervisor never sees a closed channel.
    let _mode_tx = mode_tx;

    if let Err(e) = supervisor.run().await {
        error!("capture pipeline failed: {}", e);
        std::process::exit(1);
    }
}
