//! gymlink Environment Server CLI
//!
//! Loads a configuration file, connects to the driver over ZeroMQ and
//! serves environment requests until interrupted.

use anyhow::Context;
use clap::Parser;
use gymlink_core::{ServerConfig, ServerFactory, ShutdownSignal, ZmqTransport};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Serve reinforcement-learning environments to a remote driver
#[derive(Parser, Debug)]
#[command(name = "gymlink-server")]
#[command(about = "Serve reinforcement-learning environments over ZeroMQ", long_about = None)]
struct Args {
    /// JSON configuration file ({"server_type": ..., "env": {"name": ..., "copies": ...}})
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Driver endpoint to connect to
    #[arg(short, long, default_value = "tcp://127.0.0.1:10201")]
    endpoint: String,

    /// Receive poll interval in milliseconds (how often interrupts are checked)
    #[arg(long, default_value = "100")]
    poll_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    // Logs go to stderr; stdout carries rendered frames
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if let Err(e) = run(args).await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = ServerConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    // Bad server types fail here, before any socket is opened
    let mut server = ServerFactory::build(&config)?;

    let shutdown = ShutdownSignal::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt requested, stopping after the current request");
            interrupt.trigger();
        }
    });

    let endpoint = args.endpoint;
    let poll_interval = Duration::from_millis(args.poll_ms);
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        info!("Connecting to {}", endpoint);
        let mut transport = ZmqTransport::connect_with_poll(&endpoint, poll_interval)
            .with_context(|| format!("connecting to {}", endpoint))?;
        server.serve(&mut transport, &shutdown)?;
        Ok(())
    })
    .await??;

    info!("Server exited cleanly");
    Ok(())
}
