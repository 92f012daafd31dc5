//! Headless telemetry monitor
//!
//! ```text
//! telemlink [URI] [--fast] [--simulate] [--config FILE]
//! ```
//!
//! Prints every log line and the latest sample until Ctrl-C.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use telemlink::{ClientConfig, ClientEvent, ConnectProfile, SimulatedConnector, TelemetryClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless telemetry monitor", long_about = None)]
struct Args {
    /// Device endpoint, e.g. ws://192.168.1.88/ws
    uri: Option<String>,

    /// Use the fast connect profile
    #[arg(long)]
    fast: bool,

    /// Feed the client from the built-in simulator
    #[arg(long)]
    simulate: bool,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("telemlink=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(uri) = args.uri {
        config.endpoint = uri;
    }
    if args.fast {
        config.profile = ConnectProfile::Fast;
    }

    let client = if args.simulate {
        TelemetryClient::spawn_with(config, SimulatedConnector::new())?
    } else {
        TelemetryClient::spawn(config)?
    };
    info!(endpoint = %client.endpoint(), "Monitoring");

    let mut events = Box::pin(client.events());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(ClientEvent::Log(line)) => println!("{line}"),
                Some(ClientEvent::Telemetry(sample)) => println!("  -> {sample}"),
                Some(ClientEvent::State(_)) => {}
                None => break,
            },
        }
    }

    client.shutdown().await;
    Ok(())
}
